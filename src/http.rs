use crate::logos::{self, LogoError};
use crate::package::{self, OutputItem, Packaged};
use crate::state::AppState;
use crate::{collect, compose};
use anyhow::anyhow;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, warn};

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_body_bytes;
    Router::new()
        .route("/", get(languages).post(add_logo))
        .route("/add_logo", post(add_logo))
        .route("/api/add_logo", post(add_logo))
        .route("/languages", get(languages))
        .route("/api/languages", get(languages))
        .route("/health", get(health))
        .route("/api/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn languages(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "languages": logos::list_languages(&state.config.logos_dir) }))
}

async fn add_logo(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = collect::read_form(&mut multipart).await.map_err(|err| {
        debug!(error = %err, "multipart body rejected");
        ApiError::bad_request("invalid multipart body")
    })?;
    let language = form
        .language
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request("language is required"))?
        .to_string();

    // Resolve the logo once and fail fast before touching any source image.
    let logos_dir = state.config.logos_dir.clone();
    let max_pixels = state.config.max_decoded_pixels;
    let resolve_language = language.clone();
    let logo = task::spawn_blocking(move || {
        logos::resolve(&logos_dir, &resolve_language, max_pixels)
    })
    .await
    .map_err(|err| ApiError::internal(anyhow!(err)))?
    .map_err(map_logo_error)?;

    let batch = collect::collect(&state, &form).await;
    if batch.is_empty() {
        return Err(ApiError::bad_request(
            "No images provided. Upload files or supply URLs or Excel.",
        ));
    }

    let scale = compose::effective_scale(form.logo_scale.as_deref());
    let encode_language = language.clone();
    let items = task::spawn_blocking(move || -> anyhow::Result<Vec<OutputItem>> {
        let mut items = Vec::with_capacity(batch.len());
        for source in &batch {
            let composed = compose::paste_logo(&source.image, &logo, scale);
            items.push(package::encode_item(&composed, &source.name, &encode_language)?);
        }
        Ok(items)
    })
    .await
    .map_err(|err| ApiError::internal(anyhow!(err)))?
    .map_err(ApiError::internal)?;

    let packaged = package::package(items).map_err(ApiError::internal)?;
    Ok(match packaged {
        Packaged::Single(item) => {
            attachment_response(item.content_type.as_ref(), &item.name, item.bytes)
        }
        Packaged::Archive(bytes) => {
            attachment_response("application/zip", package::ARCHIVE_NAME, bytes)
        }
    })
}

fn attachment_response(content_type: &str, filename: &str, bytes: Vec<u8>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
            .unwrap_or(HeaderValue::from_static("attachment")),
    );
    (headers, bytes).into_response()
}

fn map_logo_error(error: LogoError) -> ApiError {
    match error {
        LogoError::InvalidLanguage => ApiError::bad_request("invalid language"),
        other => ApiError::internal(anyhow::Error::new(other)),
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug)]
enum ErrorBody {
    Json(Value),
    Text(String),
}

impl ApiError {
    pub fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody::Json(json!({ "error": message })),
        }
    }

    /// Unexpected failure: the full chain is logged server-side, the client
    /// sees a plain-text summary.
    pub fn internal(error: anyhow::Error) -> Self {
        warn!(error = ?error, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody::Text(format!("Error: {error:#}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.body {
            ErrorBody::Json(value) => (self.status, Json(value)).into_response(),
            ErrorBody::Text(text) => (self.status, text).into_response(),
        }
    }
}
