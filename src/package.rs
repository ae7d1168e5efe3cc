use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{DynamicImage, ImageEncoder, RgbaImage};
use mime::Mime;
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const ARCHIVE_NAME: &str = "logo_stamped_images.zip";
const JPEG_QUALITY: u8 = 100;

/// One encoded output: final filename, media type, and the encoded bytes.
pub struct OutputItem {
    pub name: String,
    pub content_type: Mime,
    pub bytes: Vec<u8>,
}

pub enum Packaged {
    Single(OutputItem),
    Archive(Vec<u8>),
}

/// Encode a composed image under its final name. The extension rule follows
/// the filename hint: a `.png` hint stays PNG (lossless), anything else is
/// re-encoded as JPEG with the alpha channel dropped.
pub fn encode_item(image: &RgbaImage, hint: &str, language: &str) -> Result<OutputItem> {
    let (name, png) = stamped_name(hint, language);
    let mut bytes = Vec::new();
    if png {
        let encoder = PngEncoder::new_with_quality(
            &mut bytes,
            CompressionType::Best,
            PngFilterType::Adaptive,
        );
        encoder
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8.into(),
            )
            .with_context(|| format!("encode {name} as png"))?;
        Ok(OutputItem {
            name,
            content_type: mime::IMAGE_PNG,
            bytes,
        })
    } else {
        let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
        encoder
            .encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ColorType::Rgb8.into(),
            )
            .with_context(|| format!("encode {name} as jpeg"))?;
        Ok(OutputItem {
            name,
            content_type: mime::IMAGE_JPEG,
            bytes,
        })
    }
}

/// Return one item directly or bundle many into a deflate zip archive keyed
/// by the derived filenames.
pub fn package(mut items: Vec<OutputItem>) -> Result<Packaged> {
    if items.len() == 1 {
        return Ok(Packaged::Single(items.remove(0)));
    }
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for item in &items {
        writer
            .start_file(item.name.as_str(), options)
            .with_context(|| format!("add {} to archive", item.name))?;
        writer.write_all(&item.bytes)?;
    }
    let cursor = writer.finish().context("finish archive")?;
    Ok(Packaged::Archive(cursor.into_inner()))
}

/// Derive the output filename: sanitized stem + `_<language>` + extension.
/// Returns the name and whether the PNG branch applies.
pub fn stamped_name(hint: &str, language: &str) -> (String, bool) {
    let base = sanitize_file_name(hint);
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (base.as_str(), ""),
    };
    let png = ext.eq_ignore_ascii_case("png");
    let suffix = if png { "png" } else { "jpg" };
    let language = sanitize_file_name(language);
    (format!("{stem}_{language}.{suffix}"), png)
}

/// Keep only the final path component and replace characters that are unsafe
/// in filesystems or HTTP headers.
fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim();
    let sanitized: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | ' ') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.trim_matches(['.', ' ']).is_empty() {
        "image".to_string()
    } else {
        sanitized
    }
}
