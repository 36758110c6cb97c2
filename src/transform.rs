//! Label image normalization by parcel type.
//!
//! Letter-class labels come back from the carrier in portrait strip form;
//! they are rotated a quarter turn counter-clockwise, downscaled (never
//! upscaled) to fit a 4x6 inch page at 300 dpi, and composited left-aligned
//! and vertically centered on a white canvas of exactly that page size.
//! Package labels pass through at their native size, only converted to RGB
//! for embedding.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tracing::debug;

use crate::error::Result;

pub const TARGET_WIDTH_IN: f64 = 4.0;
pub const TARGET_HEIGHT_IN: f64 = 6.0;
pub const TARGET_DPI: u32 = 300;

const LETTER_KINDS: [&str; 3] = ["letter", "flat", "envelope"];

/// Whether a predefined package name means letter-class handling.
pub fn is_letter_kind(predefined_package: &str) -> bool {
    let kind = predefined_package.trim().to_ascii_lowercase();
    LETTER_KINDS.contains(&kind.as_str())
}

/// One page-ready image per shipment.
pub fn page_image(label_png: &[u8], letter: bool) -> Result<RgbImage> {
    if letter {
        letter_page(label_png)
    } else {
        package_page(label_png)
    }
}

fn letter_page(label_png: &[u8]) -> Result<RgbImage> {
    let rotated = image::load_from_memory(label_png)?.rotate270().to_rgb8();

    let page_w = (TARGET_WIDTH_IN * TARGET_DPI as f64) as u32;
    let page_h = (TARGET_HEIGHT_IN * TARGET_DPI as f64) as u32;
    let fitted = fit_within(rotated, page_w, page_h);

    let mut canvas = RgbImage::from_pixel(page_w, page_h, Rgb([255, 255, 255]));
    let paste_y = (page_h - fitted.height()) / 2;
    imageops::replace(&mut canvas, &fitted, 0, paste_y as i64);
    debug!(
        label_w = fitted.width(),
        label_h = fitted.height(),
        "letter label composited onto page canvas"
    );
    Ok(canvas)
}

fn package_page(label_png: &[u8]) -> Result<RgbImage> {
    Ok(image::load_from_memory(label_png)?.to_rgb8())
}

/// Downscale to fit within the bounds, preserving aspect ratio. Images that
/// already fit are returned untouched; nothing is ever upscaled.
fn fit_within(img: RgbImage, max_w: u32, max_h: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w <= max_w && h <= max_h {
        return img;
    }
    let scale = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
    let new_w = ((w as f64 * scale) as u32).max(1);
    let new_h = ((h as f64 * scale) as u32).max(1);
    imageops::resize(&img, new_w, new_h, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn letter_kinds_match_case_insensitively() {
        assert!(is_letter_kind("Letter"));
        assert!(is_letter_kind("FLAT"));
        assert!(is_letter_kind("envelope"));
        assert!(!is_letter_kind(""));
        assert!(!is_letter_kind("Parcel"));
    }

    #[test]
    fn letter_page_is_exact_page_size() {
        let page = page_image(&png_bytes(600, 400), true).unwrap();
        assert_eq!(page.dimensions(), (1200, 1800));
    }

    #[test]
    fn small_letter_label_is_not_upscaled() {
        // 400x600 rotates to 600x400, already within 1200x1800: white canvas
        // should carry the label pixels at original size, left-aligned.
        let page = page_image(&png_bytes(400, 600), true).unwrap();
        let top_left_of_label = page.get_pixel(0, (1800 - 400) / 2);
        assert_eq!(*top_left_of_label, Rgb([10, 20, 30]));
        assert_eq!(*page.get_pixel(1199, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn oversized_letter_label_is_downscaled_to_fit() {
        let page = page_image(&png_bytes(1000, 4000), true).unwrap();
        assert_eq!(page.dimensions(), (1200, 1800));
    }

    #[test]
    fn package_label_passes_through_unscaled() {
        let page = page_image(&png_bytes(800, 1300), false).unwrap();
        assert_eq!(page.dimensions(), (800, 1300));
    }

    #[test]
    fn fit_within_preserves_aspect_ratio() {
        let img = RgbImage::from_pixel(2400, 1800, Rgb([0, 0, 0]));
        let fitted = fit_within(img, 1200, 1800);
        assert_eq!(fitted.dimensions(), (1200, 900));
    }
}
