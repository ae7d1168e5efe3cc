use crate::state::AppState;
use bytes::BytesMut;
use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_UPLOAD_NAME: &str = "upload.jpg";
pub const DEFAULT_REMOTE_NAME: &str = "remote.jpg";

const URL_HEADERS: [&str; 2] = ["url", "image_url"];

/// A decoded user-supplied image with its filename hint. Pixels are fully
/// materialized; the source bytes can be dropped after construction.
#[derive(Debug)]
pub struct SourceImage {
    pub image: DynamicImage,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("workbook open failed: {0}")]
    Workbook(String),
}

fn fetch_error(url: &str, reason: impl Into<String>) -> IngestError {
    IngestError::Fetch {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// Decode uploaded bytes into an image, using `provided_name` as the filename
/// hint when it is non-empty.
pub fn from_upload(
    bytes: &[u8],
    provided_name: Option<&str>,
    max_pixels: u64,
) -> Result<SourceImage, IngestError> {
    let image = decode_image(bytes, max_pixels)?;
    let name = provided_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_UPLOAD_NAME)
        .to_string();
    Ok(SourceImage { image, name })
}

/// Fetch a remote image over HTTP with the configured timeout and size cap.
/// The filename hint is the last path segment with the query string stripped.
pub async fn from_url(state: &AppState, url: &str) -> Result<SourceImage, IngestError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(fetch_error(url, "unsupported url scheme"));
    }
    let _permit = state
        .fetch_semaphore
        .acquire()
        .await
        .map_err(|_| fetch_error(url, "fetch pool closed"))?;
    let mut response = state
        .client
        .get(url)
        .send()
        .await
        .map_err(|err| fetch_error(url, err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(url, format!("status {status}")));
    }
    let max_bytes = state.config.max_remote_image_bytes;
    if let Some(length) = response.content_length() {
        if length > max_bytes as u64 {
            return Err(fetch_error(url, "body exceeds size limit"));
        }
    }
    let mut buffer = BytesMut::with_capacity(std::cmp::min(max_bytes, 64 * 1024));
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| fetch_error(url, err.to_string()))?
    {
        if buffer.len() + chunk.len() > max_bytes {
            return Err(fetch_error(url, "body exceeds size limit"));
        }
        buffer.extend_from_slice(&chunk);
    }
    debug!(url = %url, size = buffer.len(), "fetched remote image");
    let image = decode_image(&buffer, state.config.max_decoded_pixels)?;
    Ok(SourceImage {
        image,
        name: filename_from_url(url),
    })
}

/// Read URLs from the first sheet of a workbook and fetch each one. Row
/// failures are independent; a workbook that cannot be opened yields an
/// empty channel.
pub async fn from_spreadsheet(state: &AppState, bytes: &[u8]) -> Vec<SourceImage> {
    let range = match open_first_sheet(bytes) {
        Ok(range) => range,
        Err(err) => {
            warn!(error = %err, "spreadsheet channel skipped");
            return Vec::new();
        }
    };
    let mut images = Vec::new();
    for url in spreadsheet_urls(&range) {
        match from_url(state, &url).await {
            Ok(image) => images.push(image),
            Err(err) => debug!(url = %url, error = %err, "spreadsheet row skipped"),
        }
    }
    images
}

fn open_first_sheet(bytes: &[u8]) -> Result<Range<Data>, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|err| IngestError::Workbook(err.to_string()))?;
    workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::Workbook("workbook has no sheets".to_string()))?
        .map_err(|err| IngestError::Workbook(err.to_string()))
}

/// Pick the URL column from the header row (`url`/`image_url`, any case,
/// trimmed) and read the rows below it; with no header match the first
/// column is read from the first row down.
fn spreadsheet_urls(range: &Range<Data>) -> Vec<String> {
    let mut rows = range.rows();
    let header_col = rows.next().and_then(|header| {
        header.iter().position(|cell| {
            cell_text(cell)
                .map(|value| URL_HEADERS.contains(&value.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
    });
    match header_col {
        Some(col) => rows.filter_map(|row| row.get(col).and_then(cell_text)).collect(),
        None => range
            .rows()
            .filter_map(|row| row.first().and_then(cell_text))
            .collect(),
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(value) => value.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

pub(crate) fn filename_from_url(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    let base = without_query.rsplit('/').next().unwrap_or("");
    if base.is_empty() {
        DEFAULT_REMOTE_NAME.to_string()
    } else {
        base.to_string()
    }
}

/// Decode with dimension and allocation limits so a hostile image cannot
/// exhaust memory before the pixel cap is checked.
pub(crate) fn decode_image(bytes: &[u8], max_pixels: u64) -> Result<DynamicImage, IngestError> {
    let (width, height) = image_dimensions(bytes)?;
    if width == 0 || height == 0 {
        return Err(IngestError::Decode("image has invalid dimensions".to_string()));
    }
    if (width as u64).saturating_mul(height as u64) > max_pixels {
        return Err(IngestError::Decode("image exceeds max decoded pixels".to_string()));
    }
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| IngestError::Decode(err.to_string()))?;
    reader.limits(decode_limits(max_pixels));
    reader
        .decode()
        .map_err(|err| IngestError::Decode(err.to_string()))
}

fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), IngestError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| IngestError::Decode(err.to_string()))?
        .into_dimensions()
        .map_err(|err| IngestError::Decode(err.to_string()))
}

fn decode_limits(max_pixels: u64) -> image::Limits {
    let max_dim = max_pixels.min(u32::MAX as u64) as u32;
    let mut limits = image::Limits::default();
    limits.max_image_width = Some(max_dim);
    limits.max_image_height = Some(max_dim);
    limits.max_alloc = Some(max_pixels.saturating_mul(4));
    limits
}
