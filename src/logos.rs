use crate::ingest;
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LogoError {
    #[error("invalid language")]
    InvalidLanguage,
    #[error("language folder not found: {0}")]
    FolderNotFound(String),
    #[error("no logo image found under: {0}")]
    NoLogoFile(String),
    #[error("logo image failed to decode: {0}")]
    Decode(String),
}

/// Resolve the logo image for `language` under `root`.
///
/// The folder match falls back to a case-insensitive scan of the root's
/// immediate subdirectories. Within the folder all files are walked in lexical
/// order and the first `*_rgb.png` wins, then any `.png`, then `.jpg`/`.jpeg`.
pub fn resolve(root: &Path, language: &str, max_pixels: u64) -> Result<DynamicImage, LogoError> {
    let language = language.trim();
    if language.is_empty() || !is_safe_language(language) {
        return Err(LogoError::InvalidLanguage);
    }
    let folder = find_language_folder(root, language)
        .ok_or_else(|| LogoError::FolderNotFound(language.to_string()))?;
    let path = select_logo_file(&folder)
        .ok_or_else(|| LogoError::NoLogoFile(folder.display().to_string()))?;
    debug!(language = %language, path = %path.display(), "resolved logo asset");
    let bytes = fs::read(&path).map_err(|err| LogoError::Decode(err.to_string()))?;
    ingest::decode_image(&bytes, max_pixels).map_err(|err| LogoError::Decode(err.to_string()))
}

/// Sorted names of the immediate subdirectories of `root`; empty when the
/// root itself is missing.
pub fn list_languages(root: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut languages: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    languages.sort();
    languages
}

fn is_safe_language(language: &str) -> bool {
    !language.contains(['/', '\\', '\0']) && language != "." && language != ".."
}

fn find_language_folder(root: &Path, language: &str) -> Option<PathBuf> {
    let direct = root.join(language);
    if direct.is_dir() {
        return Some(direct);
    }
    let mut entries: Vec<PathBuf> = fs::read_dir(root)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    entries.sort();
    entries.into_iter().find(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.eq_ignore_ascii_case(language))
            .unwrap_or(false)
    })
}

fn select_logo_file(folder: &Path) -> Option<PathBuf> {
    let mut preferred_png = None;
    let mut any_png = None;
    let mut any_jpg = None;
    walk_files(folder, &mut |path| {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with("_rgb.png") && preferred_png.is_none() {
            preferred_png = Some(path.to_path_buf());
        } else if name.ends_with(".png") && any_png.is_none() {
            any_png = Some(path.to_path_buf());
        } else if (name.ends_with(".jpg") || name.ends_with(".jpeg")) && any_jpg.is_none() {
            any_jpg = Some(path.to_path_buf());
        }
    });
    preferred_png.or(any_png).or(any_jpg)
}

/// Lexical depth-first walk. Unreadable directories are skipped so a single
/// bad entry cannot hide the rest of the tree.
fn walk_files(dir: &Path, visit: &mut dyn FnMut(&Path)) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "logo folder read failed");
            return;
        }
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            walk_files(&path, visit);
        } else {
            visit(&path);
        }
    }
}
