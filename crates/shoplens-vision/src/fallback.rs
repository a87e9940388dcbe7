//! Colour-histogram embedding used when no CLIP model is installed.
//!
//! The vector is a joint RGB histogram with 8 bins per channel (512 bins,
//! the same width as CLIP ViT-B/32). It carries no semantics, but images with
//! similar palettes land close together, which keeps the pipeline usable
//! offline and in tests.

use image::DynamicImage;

use crate::embedding::{EmbeddingModel, EMBEDDING_DIM};
use crate::types::{VisionError, VisionResult};

const BINS_PER_CHANNEL: usize = 8;
const SAMPLE_SIZE: u32 = 64;

/// Histogram-based [`EmbeddingModel`] with no text support.
#[derive(Debug, Default, Clone)]
pub struct HistogramModel;

impl HistogramModel {
    pub fn new() -> Self {
        Self
    }
}

impl EmbeddingModel for HistogramModel {
    fn name(&self) -> &str {
        "histogram"
    }

    fn encode_image(&mut self, img: &DynamicImage) -> VisionResult<Vec<f32>> {
        let sample = img
            .resize_exact(SAMPLE_SIZE, SAMPLE_SIZE, image::imageops::FilterType::Triangle)
            .to_rgb8();
        let total = (sample.width() * sample.height()) as usize;
        if total == 0 {
            return Err(VisionError::InvalidInput("image has no pixels".into()));
        }

        let mut hist = vec![0f32; EMBEDDING_DIM];
        let step = 256 / BINS_PER_CHANNEL;
        for p in sample.pixels() {
            let [r, g, b] = p.0;
            let idx = (r as usize / step) * BINS_PER_CHANNEL * BINS_PER_CHANNEL
                + (g as usize / step) * BINS_PER_CHANNEL
                + (b as usize / step);
            hist[idx] += 1.0;
        }
        for v in &mut hist {
            *v /= total as f32;
        }
        Ok(hist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(c: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb(c)))
    }

    #[test]
    fn test_solid_colour_single_bin() {
        let v = HistogramModel::new().encode_image(&solid([255, 0, 0])).unwrap();
        assert_eq!(v.len(), EMBEDDING_DIM);
        let nonzero: Vec<_> = v.iter().filter(|&&x| x > 0.0).collect();
        assert_eq!(nonzero.len(), 1);
        assert!((nonzero[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_different_colours_are_orthogonal() {
        let mut model = HistogramModel::new();
        let red = model.encode_image(&solid([250, 5, 5])).unwrap();
        let blue = model.encode_image(&solid([5, 5, 250])).unwrap();
        let dot: f32 = red.iter().zip(&blue).map(|(a, b)| a * b).sum();
        assert_eq!(dot, 0.0);
    }

    #[test]
    fn test_no_text_support() {
        let mut model = HistogramModel::new();
        assert!(!model.supports_text());
        assert!(matches!(
            model.encode_text("red shirt"),
            Err(VisionError::ModelNotAvailable(_))
        ));
    }
}
