//! Multi-representation embedding generation.

use image::DynamicImage;

use crate::embedding::{l2_normalize, EmbeddingModel};
use crate::transform;
use crate::types::{EmbeddingSet, Variant, VisionResult};

/// Generic description embedded once per search for hybrid scoring.
pub const DEFAULT_QUERY_DESCRIPTION: &str = "a product photo of clothing";

/// Encode every transform variant of `img` and L2-normalize the results.
///
/// Any encoder failure fails the whole set; a partial set would skew the
/// similarity reduction.
pub fn embed_image(model: &mut dyn EmbeddingModel, img: &DynamicImage) -> VisionResult<EmbeddingSet> {
    let mut variants = Vec::with_capacity(Variant::ALL.len());
    let mut vectors = Vec::with_capacity(Variant::ALL.len());

    for (variant, transformed) in transform::variants(img) {
        let raw = model.encode_image(&transformed)?;
        vectors.push(l2_normalize(&raw)?);
        variants.push(variant);
    }

    tracing::debug!(
        model = model.name(),
        variants = vectors.len(),
        "generated embedding set"
    );

    Ok(EmbeddingSet {
        variants,
        vectors,
        text: None,
    })
}

/// Encode `text` and L2-normalize it.
pub fn embed_text(model: &mut dyn EmbeddingModel, text: &str) -> VisionResult<Vec<f32>> {
    let raw = model.encode_text(text)?;
    l2_normalize(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::HistogramModel;
    use crate::types::VisionError;
    use image::{Rgb, RgbImage};

    struct ConstantModel(Vec<f32>);

    impl EmbeddingModel for ConstantModel {
        fn name(&self) -> &str {
            "constant"
        }
        fn encode_image(&mut self, _img: &DynamicImage) -> VisionResult<Vec<f32>> {
            Ok(self.0.clone())
        }
        fn supports_text(&self) -> bool {
            true
        }
        fn encode_text(&mut self, text: &str) -> VisionResult<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }
    }

    fn gradient() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(48, 32, |x, y| {
            Rgb([(x * 5) as u8, (y * 7) as u8, 128])
        }))
    }

    #[test]
    fn test_five_variants_in_order() {
        let set = embed_image(&mut HistogramModel::new(), &gradient()).unwrap();
        assert_eq!(set.len(), 5);
        assert_eq!(set.variants, Variant::ALL.to_vec());
        assert!(set.text.is_none());
    }

    #[test]
    fn test_all_vectors_unit_norm() {
        let set = embed_image(&mut HistogramModel::new(), &gradient()).unwrap();
        for v in &set.vectors {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4, "norm was {norm}");
        }
    }

    #[test]
    fn test_unnormalized_model_output_is_normalized() {
        let mut model = ConstantModel(vec![10.0, 0.0, 0.0]);
        let set = embed_image(&mut model, &gradient()).unwrap();
        assert!(set.vectors.iter().all(|v| v == &vec![1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_zero_output_is_an_error() {
        let mut model = ConstantModel(vec![0.0; 4]);
        assert!(matches!(
            embed_image(&mut model, &gradient()),
            Err(VisionError::Embedding(_))
        ));
    }

    #[test]
    fn test_embed_text_normalized() {
        let mut model = ConstantModel(vec![1.0]);
        let v = embed_text(&mut model, "abc").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
