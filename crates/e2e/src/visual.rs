//! Visual comparison of normalized screenshots
//!
//! Per-pixel perceptual comparison in YIQ space with anti-aliasing
//! detection. Mismatched pixels are painted into a diff image in one of two
//! colors depending on which side is darker.

use std::path::Path;

use image::{Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::E2eResult;

/// Largest possible YIQ delta between two colors
const MAX_YIQ_DELTA: f64 = 35215.0;

/// Comparison settings
#[derive(Debug, Clone)]
pub struct CompareOptions {
    /// Perceptual difference threshold, 0.0 - 1.0
    pub threshold: f64,

    /// Count anti-aliased pixels as mismatches
    pub include_antialiasing: bool,

    /// Opacity of the faded original drawn under unchanged pixels
    pub alpha: f64,

    /// Mismatch where the second image is brighter
    pub diff_color: Rgba<u8>,

    /// Mismatch where the second image is darker
    pub diff_color_alt: Rgba<u8>,

    pub aa_color: Rgba<u8>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            threshold: pagediff_common::config::DEFAULT_PIXEL_THRESHOLD,
            include_antialiasing: false,
            alpha: 0.1,
            diff_color: Rgba([255, 0, 0, 255]),
            diff_color_alt: Rgba([0, 255, 0, 255]),
            aa_color: Rgba([255, 255, 0, 255]),
        }
    }
}

impl CompareOptions {
    pub fn from_thresholds(config: &pagediff_common::config::ThresholdConfig) -> Self {
        Self {
            threshold: config.pixel,
            include_antialiasing: config.include_antialiasing,
            ..Default::default()
        }
    }
}

/// Pixel-level result of a same-size comparison
#[derive(Debug, Clone)]
pub struct PixelDiff {
    pub mismatched: u64,
    pub total: u64,
    pub diff: RgbaImage,
}

impl PixelDiff {
    /// Percentage of matching pixels
    pub fn similarity(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.total - self.mismatched) as f64 / self.total as f64 * 100.0
    }
}

/// Result of a visual comparison
#[derive(Debug, Clone)]
pub enum Comparison {
    /// Images differ in dimensions; nothing was compared
    SizeMismatch {
        left: (u32, u32),
        right: (u32, u32),
    },
    Compared(PixelDiff),
}

/// Compare two images pixel by pixel
pub fn compare(left: &RgbaImage, right: &RgbaImage, options: &CompareOptions) -> Comparison {
    if left.dimensions() != right.dimensions() {
        return Comparison::SizeMismatch {
            left: left.dimensions(),
            right: right.dimensions(),
        };
    }

    let (width, height) = left.dimensions();
    let a = left.as_raw();
    let b = right.as_raw();
    let max_delta = MAX_YIQ_DELTA * options.threshold * options.threshold;

    let mut diff = RgbaImage::new(width, height);
    let mut mismatched = 0u64;

    for y in 0..height {
        for x in 0..width {
            let pos = offset(x, y, width);
            let delta = color_delta(a, b, pos, pos, false);

            if delta.abs() > max_delta {
                let antialiased = !options.include_antialiasing
                    && (is_antialiased(a, x, y, width, height, b)
                        || is_antialiased(b, x, y, width, height, a));
                if antialiased {
                    diff.put_pixel(x, y, options.aa_color);
                } else {
                    mismatched += 1;
                    let color = if delta < 0.0 {
                        options.diff_color_alt
                    } else {
                        options.diff_color
                    };
                    diff.put_pixel(x, y, color);
                }
            } else {
                diff.put_pixel(x, y, gray_pixel(a, pos, options.alpha));
            }
        }
    }

    Comparison::Compared(PixelDiff {
        mismatched,
        total: width as u64 * height as u64,
        diff,
    })
}

/// Compare two PNG files, writing the diff image to `diff_out` when the
/// sizes match
pub fn compare_files(
    left: &Path,
    right: &Path,
    diff_out: &Path,
    options: &CompareOptions,
) -> E2eResult<Comparison> {
    let left_img = image::open(left)?.to_rgba8();
    let right_img = image::open(right)?.to_rgba8();

    let comparison = compare(&left_img, &right_img, options);
    match &comparison {
        Comparison::Compared(pixels) => {
            if let Some(parent) = diff_out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            pixels.diff.save(diff_out)?;
            debug!(
                "{} vs {}: {} of {} pixels differ",
                left.display(),
                right.display(),
                pixels.mismatched,
                pixels.total
            );
        }
        Comparison::SizeMismatch { left: l, right: r } => {
            warn!(
                "Screenshot dimensions differ: {:?} vs {:?} ({} / {})",
                l,
                r,
                left.display(),
                right.display()
            );
        }
    }

    Ok(comparison)
}

/// Hash a file using SHA256
pub fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.29889531 + g * 0.58662247 + b * 0.11448223
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.59597799 - g * 0.27417610 - b * 0.32180189
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.21147017 - g * 0.52261711 + b * 0.31114694
}

/// Blend a channel with white by `alpha`
fn blend(c: f64, alpha: f64) -> f64 {
    255.0 + (c - 255.0) * alpha
}

fn rgb_at(img: &[u8], pos: usize) -> (f64, f64, f64) {
    let (r, g, b, a) = (
        img[pos] as f64,
        img[pos + 1] as f64,
        img[pos + 2] as f64,
        img[pos + 3],
    );
    if a < 255 {
        let alpha = a as f64 / 255.0;
        (blend(r, alpha), blend(g, alpha), blend(b, alpha))
    } else {
        (r, g, b)
    }
}

/// Squared YIQ distance between two pixels, negative when the first is
/// brighter. With `y_only`, the signed brightness difference alone.
fn color_delta(a: &[u8], b: &[u8], k: usize, m: usize, y_only: bool) -> f64 {
    if a[k..k + 4] == b[m..m + 4] {
        return 0.0;
    }

    let (r1, g1, b1) = rgb_at(a, k);
    let (r2, g2, b2) = rgb_at(b, m);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;

    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

/// Faded grayscale of the original pixel
fn gray_pixel(img: &[u8], pos: usize, alpha: f64) -> Rgba<u8> {
    let y = rgb2y(img[pos] as f64, img[pos + 1] as f64, img[pos + 2] as f64);
    let v = blend(y, alpha * img[pos + 3] as f64 / 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba([v, v, v, 255])
}

/// Byte offset of the RGBA pixel at (x, y), computed in `usize`
fn offset(x: u32, y: u32, width: u32) -> usize {
    (y as usize * width as usize + x as usize) * 4
}

fn neighborhood(x: u32, y: u32, width: u32, height: u32) -> (u32, u32, u32, u32) {
    (
        x.saturating_sub(1),
        y.saturating_sub(1),
        (x + 1).min(width - 1),
        (y + 1).min(height - 1),
    )
}

/// Whether the pixel at (x1, y1) looks like anti-aliasing: it sits on a
/// brightness gradient whose darkest or brightest neighbor lies inside a
/// flat region in both images.
fn is_antialiased(img: &[u8], x1: u32, y1: u32, width: u32, height: u32, other: &[u8]) -> bool {
    let (x0, y0, x2, y2) = neighborhood(x1, y1, width, height);
    let pos = offset(x1, y1, width);

    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    let mut min = 0.0;
    let mut max = 0.0;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (0, 0, 0, 0);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let delta = color_delta(img, img, pos, offset(x, y, width), true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_x = x;
                min_y = y;
            } else if delta > max {
                max = delta;
                max_x = x;
                max_y = y;
            }
        }
    }

    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, min_x, min_y, width, height)
        && has_many_siblings(other, min_x, min_y, width, height))
        || (has_many_siblings(img, max_x, max_y, width, height)
            && has_many_siblings(other, max_x, max_y, width, height))
}

/// More than two neighbors share this pixel's exact color
fn has_many_siblings(img: &[u8], x1: u32, y1: u32, width: u32, height: u32) -> bool {
    let (x0, y0, x2, y2) = neighborhood(x1, y1, width, height);
    let pos = offset(x1, y1, width);
    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let other = offset(x, y, width);
            if img[pos..pos + 4] == img[other..other + 4] {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn expect_compared(c: Comparison) -> PixelDiff {
        match c {
            Comparison::Compared(p) => p,
            other => panic!("expected a pixel comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_offset_does_not_wrap_on_large_frames() {
        // 70_000 x 70_000 RGBA exceeds u32::MAX bytes
        assert_eq!(offset(69_999, 69_999, 70_000), (69_999usize * 70_000 + 69_999) * 4);
        assert_eq!(offset(3, 2, 10), 92);
    }

    #[test]
    fn test_identical_white_frames() {
        let a = RgbaImage::from_pixel(1280, 800, WHITE);
        let b = a.clone();

        let pixels = expect_compared(compare(&a, &b, &CompareOptions::default()));

        assert_eq!(pixels.mismatched, 0);
        assert_eq!(pixels.total, 1280 * 800);
        assert_eq!(pixels.similarity(), 100.0);
        assert!(pixels.diff.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn test_white_against_black() {
        let a = RgbaImage::from_pixel(1280, 800, WHITE);
        let b = RgbaImage::from_pixel(1280, 800, BLACK);

        let pixels = expect_compared(compare(&a, &b, &CompareOptions::default()));

        assert_eq!(pixels.mismatched, pixels.total);
        assert!(pixels.similarity().abs() < 1e-9);
    }

    #[test]
    fn test_diff_color_depends_on_direction() {
        let options = CompareOptions::default();
        let white = RgbaImage::from_pixel(4, 4, WHITE);
        let black = RgbaImage::from_pixel(4, 4, BLACK);

        let darker = expect_compared(compare(&white, &black, &options));
        assert_eq!(*darker.diff.get_pixel(1, 1), options.diff_color_alt);

        let brighter = expect_compared(compare(&black, &white, &options));
        assert_eq!(*brighter.diff.get_pixel(1, 1), options.diff_color);
    }

    #[test]
    fn test_small_difference_is_below_threshold() {
        let a = RgbaImage::from_pixel(8, 8, Rgba([200, 200, 200, 255]));
        let b = RgbaImage::from_pixel(8, 8, Rgba([203, 200, 200, 255]));

        let pixels = expect_compared(compare(&a, &b, &CompareOptions::default()));
        assert_eq!(pixels.mismatched, 0);
    }

    #[test]
    fn test_partial_change_similarity() {
        let a = RgbaImage::from_pixel(10, 10, WHITE);
        let mut b = a.clone();
        for x in 0..10 {
            b.put_pixel(x, 0, BLACK);
        }
        // a solid bar on the edge is not anti-aliasing
        let pixels = expect_compared(compare(&a, &b, &CompareOptions::default()));
        assert_eq!(pixels.mismatched, 10);
        assert!((pixels.similarity() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_size_mismatch_is_reported() {
        let a = RgbaImage::from_pixel(1280, 800, WHITE);
        let b = RgbaImage::from_pixel(1280, 801, WHITE);

        match compare(&a, &b, &CompareOptions::default()) {
            Comparison::SizeMismatch { left, right } => {
                assert_eq!(left, (1280, 800));
                assert_eq!(right, (1280, 801));
            }
            other => panic!("expected size mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_compare_files_skips_diff_on_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        let diff = dir.path().join("diff/a.png");
        RgbaImage::from_pixel(20, 10, WHITE).save(&a).unwrap();
        RgbaImage::from_pixel(10, 20, WHITE).save(&b).unwrap();

        let result = compare_files(&a, &b, &diff, &CompareOptions::default()).unwrap();

        assert!(matches!(result, Comparison::SizeMismatch { .. }));
        assert!(!diff.exists());
    }

    #[test]
    fn test_compare_files_writes_diff() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        let diff = dir.path().join("diff/a.png");
        RgbaImage::from_pixel(20, 10, WHITE).save(&a).unwrap();
        RgbaImage::from_pixel(20, 10, BLACK).save(&b).unwrap();

        let result = compare_files(&a, &b, &diff, &CompareOptions::default()).unwrap();

        assert_eq!(expect_compared(result).mismatched, 200);
        assert_eq!(image::open(&diff).unwrap().width(), 20);
    }

    #[test]
    fn test_hash_file_matches_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        std::fs::write(&a, b"same").unwrap();
        std::fs::write(&b, b"same").unwrap();
        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
        assert_eq!(hash_file(&a).unwrap().len(), 64);
    }
}
