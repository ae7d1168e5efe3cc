use crate::ingest::{self, SourceImage};
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::extract::Multipart;
use bytes::Bytes;
use tracing::debug;

pub const LANGUAGE_FIELD: &str = "language";
pub const SCALE_FIELD: &str = "logo_scale";
pub const URL_FIELD: &str = "url";
pub const SPREADSHEET_FIELD: &str = "excel";

/// The raw request channels, split out of the multipart body. Nothing is
/// fetched or decoded yet except the already-buffered upload bytes.
#[derive(Default)]
pub struct LogoForm {
    pub language: Option<String>,
    pub logo_scale: Option<String>,
    pub uploads: Vec<(Bytes, Option<String>)>,
    pub urls: Vec<String>,
    pub spreadsheet: Option<Bytes>,
}

/// Walk the multipart fields into a [`LogoForm`]. Every field except the
/// well-known text fields and the reserved spreadsheet field is treated as
/// an image upload.
pub async fn read_form(multipart: &mut Multipart) -> Result<LogoForm> {
    let mut form = LogoForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .context("read multipart field")?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(LANGUAGE_FIELD) => {
                form.language = Some(field.text().await.context("read language field")?);
            }
            Some(SCALE_FIELD) => {
                form.logo_scale = Some(field.text().await.context("read logo_scale field")?);
            }
            Some(URL_FIELD) => {
                let value = field.text().await.context("read url field")?;
                let value = value.trim();
                if !value.is_empty() {
                    form.urls.push(value.to_string());
                }
            }
            Some(SPREADSHEET_FIELD) => {
                form.spreadsheet = Some(field.bytes().await.context("read spreadsheet field")?);
            }
            _ => {
                let file_name = field.file_name().map(str::to_string);
                let data = field.bytes().await.context("read upload field")?;
                // browsers send an empty part for a blank file input
                if data.is_empty() {
                    continue;
                }
                form.uploads.push((data, file_name));
            }
        }
    }
    Ok(form)
}

/// Ingest every channel into one ordered batch: files, then URLs, then
/// spreadsheet rows. Items that fail to fetch or decode are dropped; an
/// empty result is the caller's problem, not an error here.
pub async fn collect(state: &AppState, form: &LogoForm) -> Vec<SourceImage> {
    let max_pixels = state.config.max_decoded_pixels;
    let mut batch = Vec::new();
    for (data, name) in &form.uploads {
        match ingest::from_upload(data, name.as_deref(), max_pixels) {
            Ok(image) => batch.push(image),
            Err(err) => debug!(error = %err, "upload skipped"),
        }
    }
    for url in &form.urls {
        match ingest::from_url(state, url).await {
            Ok(image) => batch.push(image),
            Err(err) => debug!(url = %url, error = %err, "url skipped"),
        }
    }
    if let Some(bytes) = form.spreadsheet.as_ref() {
        batch.extend(ingest::from_spreadsheet(state, bytes).await);
    }
    batch
}
