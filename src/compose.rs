use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage, imageops};

pub const DEFAULT_SCALE: f32 = 0.40;
pub const MIN_SCALE: f32 = 0.05;
pub const MAX_SCALE: f32 = 1.0;

const PAD_LEFT: i64 = 25;
const PAD_BOTTOM: i64 = 30;

/// Parse a raw `logo_scale` form value. Missing, unparsable, or non-finite
/// values fall back to the default; everything is clamped to the valid range.
pub fn effective_scale(raw: Option<&str>) -> f32 {
    raw.and_then(|value| value.trim().parse::<f32>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(DEFAULT_SCALE)
        .clamp(MIN_SCALE, MAX_SCALE)
}

/// Overlay `logo` onto `base` at the bottom-left anchor and return a new
/// image of the base's exact dimensions. Neither input is mutated.
///
/// The logo is resized to `scale` of the base width (aspect ratio preserved,
/// both dimensions at least 1px) with Lanczos3 resampling; its alpha channel
/// acts as the blend mask. When the resized logo is taller than the space
/// above the bottom padding, the vertical position clamps to the top edge.
pub fn paste_logo(base: &DynamicImage, logo: &DynamicImage, scale: f32) -> RgbaImage {
    let mut canvas = base.to_rgba8();
    let base_height = canvas.height() as i64;

    let target_w = ((canvas.width() as f32 * scale).round() as u32).max(1);
    let ratio = target_w as f32 / logo.width() as f32;
    let target_h = ((logo.height() as f32 * ratio).round() as u32).max(1);
    let resized = imageops::resize(&logo.to_rgba8(), target_w, target_h, FilterType::Lanczos3);

    let y = (base_height - target_h as i64 - PAD_BOTTOM).max(0);
    imageops::overlay(&mut canvas, &resized, PAD_LEFT, y);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    #[test]
    fn scale_parses_clamps_and_defaults() {
        assert_eq!(effective_scale(None), 0.40);
        assert_eq!(effective_scale(Some("abc")), 0.40);
        assert_eq!(effective_scale(Some("")), 0.40);
        assert_eq!(effective_scale(Some("NaN")), 0.40);
        assert_eq!(effective_scale(Some("0.25")), 0.25);
        assert_eq!(effective_scale(Some("0.01")), 0.05);
        assert_eq!(effective_scale(Some("7")), 1.0);
        assert_eq!(effective_scale(Some("-3")), 0.05);
    }

    #[test]
    fn output_always_matches_base_dimensions() {
        let base = solid(200, 120, [255, 0, 0, 255]);
        for logo in [solid(4, 4, [0, 0, 255, 255]), solid(900, 40, [0, 0, 255, 255])] {
            for scale in [0.05, 0.40, 1.0] {
                let composed = paste_logo(&base, &logo, scale);
                assert_eq!((composed.width(), composed.height()), (200, 120));
            }
        }
    }

    #[test]
    fn logo_lands_at_bottom_left_anchor() {
        let base = solid(200, 200, [255, 0, 0, 255]);
        let logo = solid(4, 4, [0, 0, 255, 255]);
        // scale 0.05 of width 200 -> 10x10 logo at x=25, y=200-10-30=160
        let composed = paste_logo(&base, &logo, 0.05);
        assert_eq!(composed.get_pixel(25, 160), &Rgba([0, 0, 255, 255]));
        assert_eq!(composed.get_pixel(34, 169), &Rgba([0, 0, 255, 255]));
        assert_eq!(composed.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(composed.get_pixel(24, 160), &Rgba([255, 0, 0, 255]));
        assert_eq!(composed.get_pixel(25, 170), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn tall_logo_clamps_to_top_edge() {
        let base = solid(40, 10, [255, 0, 0, 255]);
        let logo = solid(1, 100, [0, 0, 255, 255]);
        // target width 40, ratio 40 -> height 4000 >> 10: y clamps to 0
        let composed = paste_logo(&base, &logo, 1.0);
        assert_eq!((composed.width(), composed.height()), (40, 10));
        assert_eq!(composed.get_pixel(25, 0), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn transparent_logo_leaves_base_untouched() {
        let base = solid(64, 64, [10, 20, 30, 255]);
        let logo = solid(8, 8, [255, 255, 255, 0]);
        let composed = paste_logo(&base, &logo, 0.40);
        for pixel in composed.pixels() {
            assert_eq!(pixel, &Rgba([10, 20, 30, 255]));
        }
    }

    #[test]
    fn resize_never_collapses_below_one_pixel() {
        let base = solid(1, 1, [255, 0, 0, 255]);
        let logo = solid(100, 1, [0, 0, 255, 255]);
        let composed = paste_logo(&base, &logo, 0.05);
        assert_eq!((composed.width(), composed.height()), (1, 1));
    }

    #[test]
    fn inputs_are_not_mutated() {
        let base = solid(50, 50, [255, 0, 0, 255]);
        let logo = solid(10, 10, [0, 0, 255, 255]);
        let _ = paste_logo(&base, &logo, 0.40);
        assert_eq!(base.to_rgba8().get_pixel(25, 12), &Rgba([255, 0, 0, 255]));
        assert_eq!(logo.to_rgba8().get_pixel(5, 5), &Rgba([0, 0, 255, 255]));
    }
}
