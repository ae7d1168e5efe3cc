use anyhow::Result;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub logos_dir: PathBuf,
    pub fetch_timeout: Duration,
    pub max_remote_image_bytes: usize,
    pub max_upload_body_bytes: usize,
    pub max_decoded_pixels: u64,
    pub max_concurrent_fetches: usize,
    pub max_in_flight_requests: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_u16("PORT", 8080);

        let logos_dir = match env::var("LOGOS_DIR") {
            Ok(value) => PathBuf::from(value),
            Err(_) => resolve_logos_root(),
        };
        if !logos_dir.is_dir() {
            warn!(path = %logos_dir.display(), "logos directory does not exist yet");
        }

        let fetch_timeout = Duration::from_secs(parse_u64("FETCH_TIMEOUT_SECONDS", 30));
        let max_remote_image_bytes = parse_usize("MAX_REMOTE_IMAGE_MB", 25) * 1024 * 1024;
        let max_upload_body_bytes = parse_usize("MAX_UPLOAD_BODY_MB", 100) * 1024 * 1024;
        let max_decoded_pixels = parse_u64("MAX_DECODED_PIXELS", 100_000_000);
        let max_concurrent_fetches = parse_usize("MAX_CONCURRENT_FETCHES", 8);
        let max_in_flight_requests = parse_usize("MAX_IN_FLIGHT_REQUESTS", 64);

        Ok(Self {
            host,
            port,
            logos_dir,
            fetch_timeout,
            max_remote_image_bytes,
            max_upload_body_bytes,
            max_decoded_pixels,
            max_concurrent_fetches,
            max_in_flight_requests,
        })
    }
}

/// Search candidate base paths for a `logos` directory, mirroring how the
/// service is deployed next to its asset tree. Falls back to `./logos` when
/// nothing matches so a missing root degrades to empty language listings.
fn resolve_logos_root() -> PathBuf {
    let mut candidates = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        candidates.push(cwd.join("logos"));
        if let Some(parent) = cwd.parent() {
            candidates.push(parent.join("logos"));
        }
    }
    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("logos"));
            if let Some(parent) = dir.parent() {
                candidates.push(parent.join("logos"));
            }
        }
    }
    for candidate in &candidates {
        if candidate.is_dir() {
            return candidate.clone();
        }
    }
    PathBuf::from("logos")
}

fn parse_u16(key: &str, default: u16) -> u16 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
