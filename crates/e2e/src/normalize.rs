//! Canonical-frame normalization
//!
//! Screenshots of the same page rarely share dimensions across environments,
//! so each one is fitted ("contain") into a fixed frame before comparison.

use std::io::Cursor;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use crate::error::E2eResult;

/// Padding around fitted content: white, fully transparent
pub const PAD_COLOR: Rgba<u8> = Rgba([255, 255, 255, 0]);

/// Fit the image at `path` into `width`x`height` and overwrite it in place
pub fn normalize(path: &Path, width: u32, height: u32) -> E2eResult<()> {
    let img = image::open(path)?;
    let (w, h) = img.dimensions();
    let framed = fit_contain(&img, width, height);
    std::fs::write(path, encode_png(&framed)?)?;
    debug!("Normalized {} from {}x{} to {}x{}", path.display(), w, h, width, height);
    Ok(())
}

/// Scale `img` with its aspect ratio kept so it fits inside the frame,
/// then center it on a padded canvas of exactly `width`x`height`.
pub fn fit_contain(img: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, PAD_COLOR);
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || width == 0 || height == 0 {
        return canvas;
    }

    let scale = (width as f64 / w as f64).min(height as f64 / h as f64);
    let fit_w = ((w as f64 * scale).round() as u32).clamp(1, width);
    let fit_h = ((h as f64 * scale).round() as u32).clamp(1, height);

    let source = img.to_rgba8();
    let fitted = if (fit_w, fit_h) == (w, h) {
        source
    } else {
        imageops::resize(&source, fit_w, fit_h, FilterType::Lanczos3)
    };

    let x = (width - fit_w) / 2;
    let y = (height - fit_h) / 2;
    imageops::replace(&mut canvas, &fitted, x as i64, y as i64);
    canvas
}

/// Encode an image as PNG bytes
pub fn encode_png(img: &RgbaImage) -> E2eResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([200, 0, 0, 255]);

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, RED))
    }

    #[test]
    fn test_wide_image_is_letterboxed() {
        let out = fit_contain(&solid(2560, 800), 1280, 800);
        assert_eq!(out.dimensions(), (1280, 800));
        // 1280x400 content centered vertically
        assert_eq!(*out.get_pixel(640, 0), PAD_COLOR);
        assert_eq!(*out.get_pixel(640, 199), PAD_COLOR);
        assert_eq!(*out.get_pixel(640, 400), RED);
        assert_eq!(*out.get_pixel(640, 799), PAD_COLOR);
    }

    #[test]
    fn test_tall_image_is_pillarboxed() {
        let out = fit_contain(&solid(400, 1600), 1280, 800);
        assert_eq!(out.dimensions(), (1280, 800));
        // 200x800 content at x = 540..740
        assert_eq!(*out.get_pixel(0, 400), PAD_COLOR);
        assert_eq!(*out.get_pixel(539, 400), PAD_COLOR);
        assert_eq!(*out.get_pixel(640, 400), RED);
        assert_eq!(*out.get_pixel(740, 400), PAD_COLOR);
    }

    #[test]
    fn test_small_image_is_enlarged() {
        let out = fit_contain(&solid(640, 400), 1280, 800);
        assert_eq!(*out.get_pixel(0, 0), RED);
        assert_eq!(*out.get_pixel(1279, 799), RED);
    }

    #[test]
    fn test_normalize_rewrites_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("staging.png");
        let b = dir.path().join("prod.png");
        solid(1280, 3000).save(&a).unwrap();
        solid(1024, 2200).save(&b).unwrap();

        normalize(&a, 1280, 800).unwrap();
        normalize(&b, 1280, 800).unwrap();

        assert_eq!(image::open(&a).unwrap().dimensions(), (1280, 800));
        assert_eq!(image::open(&b).unwrap().dimensions(), (1280, 800));
    }

    #[test]
    fn test_normalize_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(normalize(&dir.path().join("absent.png"), 1280, 800).is_err());
    }
}
