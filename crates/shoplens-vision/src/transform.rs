//! Photographic transform variants.
//!
//! Creative assets and catalog photography differ in lighting, framing and
//! sharpness. Each source image is expanded into a fixed set of variants so
//! the similarity reduction can pick up matches that survive those shifts.

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::types::Variant;

/// Contrast enhancement factor (1.0 leaves the image unchanged).
pub const CONTRAST_FACTOR: f32 = 1.5;

/// Brightness enhancement factor (1.0 leaves the image unchanged).
pub const BRIGHTNESS_FACTOR: f32 = 1.3;

/// Gaussian blur sigma for the slight-blur variant.
pub const BLUR_SIGMA: f32 = 1.0;

/// Produce every variant of `img`, in [`Variant::ALL`] order.
pub fn variants(img: &DynamicImage) -> Vec<(Variant, DynamicImage)> {
    Variant::ALL
        .iter()
        .map(|&v| (v, apply(img, v)))
        .collect()
}

/// Apply a single transform.
pub fn apply(img: &DynamicImage, variant: Variant) -> DynamicImage {
    match variant {
        Variant::Identity => img.clone(),
        Variant::CenterCrop => center_crop(img),
        Variant::Contrast => enhance_contrast(img, CONTRAST_FACTOR),
        Variant::Brightness => enhance_brightness(img, BRIGHTNESS_FACTOR),
        Variant::Blur => img.blur(BLUR_SIGMA),
    }
}

/// Crop the largest centered square.
pub fn center_crop(img: &DynamicImage) -> DynamicImage {
    let (w, h) = img.dimensions();
    let side = w.min(h);
    let left = (w - side) / 2;
    let top = (h - side) / 2;
    img.crop_imm(left, top, side, side)
}

/// Blend every channel away from the mean grey level by `factor`.
pub fn enhance_contrast(img: &DynamicImage, factor: f32) -> DynamicImage {
    let rgb = img.to_rgb8();
    let mean = mean_luma(&rgb);
    map_channels(&rgb, |c| mean + factor * (c - mean))
}

/// Scale every channel by `factor`.
pub fn enhance_brightness(img: &DynamicImage, factor: f32) -> DynamicImage {
    let rgb = img.to_rgb8();
    map_channels(&rgb, |c| c * factor)
}

fn mean_luma(rgb: &RgbImage) -> f32 {
    let pixels = (rgb.width() as f64) * (rgb.height() as f64);
    if pixels == 0.0 {
        return 0.0;
    }
    let total: f64 = rgb
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            (299.0 * r as f64 + 587.0 * g as f64 + 114.0 * b as f64) / 1000.0
        })
        .sum();
    (total / pixels).round() as f32
}

fn map_channels(rgb: &RgbImage, f: impl Fn(f32) -> f32) -> DynamicImage {
    let mut out = RgbImage::new(rgb.width(), rgb.height());
    for (x, y, p) in rgb.enumerate_pixels() {
        let [r, g, b] = p.0;
        out.put_pixel(
            x,
            y,
            Rgb([
                clamp_channel(f(r as f32)),
                clamp_channel(f(g as f32)),
                clamp_channel(f(b as f32)),
            ]),
        );
    }
    DynamicImage::ImageRgb8(out)
}

fn clamp_channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, c: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(c)))
    }

    #[test]
    fn test_variant_order() {
        let img = solid(40, 20, [10, 20, 30]);
        let order: Vec<Variant> = variants(&img).into_iter().map(|(v, _)| v).collect();
        assert_eq!(order, Variant::ALL.to_vec());
    }

    #[test]
    fn test_center_crop_landscape() {
        let img = solid(40, 20, [0, 0, 0]);
        assert_eq!(center_crop(&img).dimensions(), (20, 20));
    }

    #[test]
    fn test_center_crop_portrait() {
        let img = solid(9, 30, [0, 0, 0]);
        assert_eq!(center_crop(&img).dimensions(), (9, 9));
    }

    #[test]
    fn test_brightness_scales_and_clamps() {
        let img = solid(2, 2, [100, 200, 250]);
        let out = enhance_brightness(&img, 1.3).to_rgb8();
        assert_eq!(out.get_pixel(0, 0).0, [130, 255, 255]);
    }

    #[test]
    fn test_contrast_pushes_away_from_mean() {
        let mut rgb = RgbImage::from_pixel(2, 1, Rgb([50, 50, 50]));
        rgb.put_pixel(1, 0, Rgb([150, 150, 150]));
        let out = enhance_contrast(&DynamicImage::ImageRgb8(rgb), 1.5).to_rgb8();
        // mean luma is 100; 50 -> 25, 150 -> 175
        assert_eq!(out.get_pixel(0, 0).0, [25, 25, 25]);
        assert_eq!(out.get_pixel(1, 0).0, [175, 175, 175]);
    }

    #[test]
    fn test_contrast_identity_factor() {
        let img = solid(3, 3, [12, 34, 56]);
        let out = enhance_contrast(&img, 1.0).to_rgb8();
        assert_eq!(out.get_pixel(1, 1).0, [12, 34, 56]);
    }

    #[test]
    fn test_blur_keeps_dimensions() {
        let img = solid(16, 8, [200, 10, 10]);
        assert_eq!(apply(&img, Variant::Blur).dimensions(), (16, 8));
    }
}
