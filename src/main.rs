mod collect;
mod compose;
mod config;
mod http;
mod ingest;
mod logos;
mod package;
mod state;

use crate::config::Config;
use crate::state::AppState;
use axum::Router;
use axum::body::HttpBody;
use axum::http::{Response, header};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::compression::{
    CompressionLayer,
    predicate::{DefaultPredicate, Predicate},
};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::info;

/// Image and zip bodies are already compressed; recompressing them wastes
/// CPU for no size win.
#[derive(Clone)]
struct NoBinaryCompression {
    inner: DefaultPredicate,
}

impl NoBinaryCompression {
    fn new() -> Self {
        Self {
            inner: DefaultPredicate::new(),
        }
    }
}

impl Predicate for NoBinaryCompression {
    fn should_compress<B>(&self, response: &Response<B>) -> bool
    where
        B: HttpBody,
    {
        if let Some(content_type) = response.headers().get(header::CONTENT_TYPE) {
            if let Ok(content_type) = content_type.to_str() {
                if content_type.starts_with("image/") || content_type == "application/zip" {
                    return false;
                }
            }
        }
        self.inner.should_compress(response)
    }
}

fn build_app(state: Arc<AppState>) -> Router {
    let max_in_flight = if state.config.max_in_flight_requests == 0 {
        usize::MAX
    } else {
        state.config.max_in_flight_requests
    };
    http::router(state)
        .layer(CompressionLayer::new().compress_when(NoBinaryCompression::new()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false)),
        )
        .layer(ConcurrencyLimitLayer::new(max_in_flight))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    info!(
        logos_dir = %config.logos_dir.display(),
        fetch_timeout_seconds = config.fetch_timeout.as_secs(),
        max_concurrent_fetches = config.max_concurrent_fetches,
        max_in_flight_requests = config.max_in_flight_requests,
        "startup config summary"
    );
    let state = Arc::new(AppState::new(config)?);

    let app = build_app(state.clone());
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(address = %addr, "logo stamper listening");
    axum::serve(listener, app).await?;
    Ok(())
}
