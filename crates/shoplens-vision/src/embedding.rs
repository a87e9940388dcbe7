//! The embedding-model capability and its CLIP (ONNX Runtime) implementation.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ndarray::{Array2, Array4};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use crate::fallback::HistogramModel;
use crate::types::{VisionError, VisionResult};

/// Default embedding dimension for CLIP ViT-B/32.
pub const EMBEDDING_DIM: usize = 512;

/// Default model directory, relative to the home directory.
pub const MODEL_DIR: &str = ".shoplens/models";

/// Default visual model filename.
pub const VISUAL_MODEL_FILENAME: &str = "clip-vit-base-patch32-visual.onnx";

/// Default text model filename.
pub const TEXT_MODEL_FILENAME: &str = "clip-vit-base-patch32-text.onnx";

/// Default tokenizer filename (HuggingFace `tokenizer.json` format).
pub const TOKENIZER_FILENAME: &str = "clip-tokenizer.json";

/// CLIP image preprocessing constants.
const CLIP_IMAGE_SIZE: u32 = 224;
#[allow(clippy::excessive_precision)]
const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
#[allow(clippy::excessive_precision)]
const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

/// CLIP text context length and end-of-text token.
const CLIP_CONTEXT_LEN: usize = 77;
const CLIP_EOT_ID: i64 = 49407;

/// Something that maps images (and optionally text) into a shared vector space.
///
/// Implementations return raw vectors; callers normalize.
pub trait EmbeddingModel: Send {
    /// Short model name for logs.
    fn name(&self) -> &str;

    /// Encode one image.
    fn encode_image(&mut self, img: &DynamicImage) -> VisionResult<Vec<f32>>;

    /// Whether [`EmbeddingModel::encode_text`] is available.
    fn supports_text(&self) -> bool {
        false
    }

    /// Encode a piece of text into the image vector space.
    fn encode_text(&mut self, _text: &str) -> VisionResult<Vec<f32>> {
        Err(VisionError::ModelNotAvailable(format!(
            "{} has no text encoder",
            self.name()
        )))
    }
}

/// File locations for the CLIP model pair.
#[derive(Debug, Clone, Default)]
pub struct ClipPaths {
    pub visual: Option<PathBuf>,
    pub text: Option<PathBuf>,
    pub tokenizer: Option<PathBuf>,
}

impl ClipPaths {
    /// Fill unset paths with the defaults under `~/.shoplens/models/`.
    pub fn with_defaults(mut self) -> Self {
        let dir = default_model_dir();
        self.visual
            .get_or_insert_with(|| dir.join(VISUAL_MODEL_FILENAME));
        self.text.get_or_insert_with(|| dir.join(TEXT_MODEL_FILENAME));
        self.tokenizer
            .get_or_insert_with(|| dir.join(TOKENIZER_FILENAME));
        self
    }
}

/// `~/.shoplens/models`, or `./.shoplens/models` without a home directory.
pub fn default_model_dir() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(MODEL_DIR)
}

/// Load the best available model.
///
/// Uses CLIP when the visual model file exists; otherwise logs a warning and
/// falls back to [`HistogramModel`], which still yields usable unit vectors.
pub fn load_model(paths: &ClipPaths) -> VisionResult<Box<dyn EmbeddingModel>> {
    match paths.visual.as_deref() {
        Some(p) if p.exists() => Ok(Box::new(ClipModel::load(paths)?)),
        other => {
            tracing::warn!(
                "CLIP model not found at {}. Running with the colour-histogram fallback. \
                 Download a CLIP ONNX model to enable semantic similarity.",
                other.map(|p| p.display().to_string()).unwrap_or_else(|| "<unset>".into())
            );
            Ok(Box::new(HistogramModel::new()))
        }
    }
}

struct ClipText {
    session: Session,
    tokenizer: Tokenizer,
}

/// CLIP ViT-B/32 via ONNX Runtime, with an optional text tower.
pub struct ClipModel {
    visual: Session,
    text: Option<ClipText>,
}

impl ClipModel {
    /// Load the visual model, and the text model when both it and its
    /// tokenizer are present.
    pub fn load(paths: &ClipPaths) -> VisionResult<Self> {
        let visual_path = paths
            .visual
            .as_deref()
            .ok_or_else(|| VisionError::ModelNotAvailable("no visual model path".into()))?;
        let visual = open_session(visual_path)?;

        let text = match (paths.text.as_deref(), paths.tokenizer.as_deref()) {
            (Some(model), Some(tok)) if model.exists() && tok.exists() => {
                let tokenizer = Tokenizer::from_file(tok)
                    .map_err(|e| VisionError::Tokenizer(format!("{}: {e}", tok.display())))?;
                Some(ClipText {
                    session: open_session(model)?,
                    tokenizer,
                })
            }
            _ => {
                tracing::info!("CLIP text model not configured; hybrid scoring disabled");
                None
            }
        };

        Ok(Self { visual, text })
    }
}

fn open_session(path: &Path) -> VisionResult<Session> {
    if !path.exists() {
        return Err(VisionError::ModelNotAvailable(path.display().to_string()));
    }
    tracing::info!("Loading ONNX model from {}", path.display());
    Session::builder()
        .and_then(|b| b.with_intra_threads(1))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| VisionError::Embedding(format!("Failed to load ONNX model: {e}")))
}

impl EmbeddingModel for ClipModel {
    fn name(&self) -> &str {
        "clip-vit-b32"
    }

    fn encode_image(&mut self, img: &DynamicImage) -> VisionResult<Vec<f32>> {
        let resized = img.resize_exact(
            CLIP_IMAGE_SIZE,
            CLIP_IMAGE_SIZE,
            image::imageops::FilterType::Lanczos3,
        );
        let rgb = resized.to_rgb8();

        // NCHW [1, 3, 224, 224]
        let mut tensor =
            Array4::<f32>::zeros((1, 3, CLIP_IMAGE_SIZE as usize, CLIP_IMAGE_SIZE as usize));

        for y in 0..CLIP_IMAGE_SIZE {
            for x in 0..CLIP_IMAGE_SIZE {
                let pixel = rgb.get_pixel(x, y);
                for c in 0..3usize {
                    let val = pixel[c] as f32 / 255.0;
                    tensor[[0, c, y as usize, x as usize]] = (val - CLIP_MEAN[c]) / CLIP_STD[c];
                }
            }
        }

        let input = Tensor::from_array(tensor)
            .map_err(|e| VisionError::Embedding(format!("Failed to create input tensor: {e}")))?;
        let outputs = self
            .visual
            .run(ort::inputs![input])
            .map_err(|e| VisionError::Embedding(format!("ONNX inference failed: {e}")))?;
        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Embedding(format!("Failed to extract output: {e}")))?;

        Ok(data.to_vec())
    }

    fn supports_text(&self) -> bool {
        self.text.is_some()
    }

    fn encode_text(&mut self, text: &str) -> VisionResult<Vec<f32>> {
        let clip_text = self
            .text
            .as_mut()
            .ok_or_else(|| VisionError::ModelNotAvailable("CLIP text model".into()))?;

        let encoding = clip_text
            .tokenizer
            .encode(text, true)
            .map_err(|e| VisionError::Tokenizer(e.to_string()))?;
        let ids = pad_token_ids(encoding.get_ids());

        let input = Array2::<i64>::from_shape_vec((1, CLIP_CONTEXT_LEN), ids)
            .map_err(|e| VisionError::Embedding(format!("Bad token shape: {e}")))?;
        let input = Tensor::from_array(input)
            .map_err(|e| VisionError::Embedding(format!("Failed to create input tensor: {e}")))?;
        let outputs = clip_text
            .session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::Embedding(format!("ONNX inference failed: {e}")))?;
        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Embedding(format!("Failed to extract output: {e}")))?;

        Ok(data.to_vec())
    }
}

/// Pad or truncate token ids to CLIP's fixed context length. Truncated
/// sequences keep a trailing end-of-text token.
fn pad_token_ids(ids: &[u32]) -> Vec<i64> {
    let mut out: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
    if out.len() >= CLIP_CONTEXT_LEN {
        out.truncate(CLIP_CONTEXT_LEN);
        out[CLIP_CONTEXT_LEN - 1] = CLIP_EOT_ID;
    } else {
        out.resize(CLIP_CONTEXT_LEN, CLIP_EOT_ID);
    }
    out
}

/// L2-normalize a vector. Zero or non-finite norms are an error because the
/// result could not satisfy the unit-norm invariant.
pub fn l2_normalize(v: &[f32]) -> VisionResult<Vec<f32>> {
    let norm = v
        .iter()
        .map(|&x| (x as f64) * (x as f64))
        .sum::<f64>()
        .sqrt();
    if v.is_empty() || norm == 0.0 || !norm.is_finite() {
        return Err(VisionError::Embedding(format!(
            "cannot normalize vector of length {} (norm {norm})",
            v.len()
        )));
    }
    Ok(v.iter().map(|&x| (x as f64 / norm) as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_falls_back() {
        let paths = ClipPaths {
            visual: Some(PathBuf::from("/nonexistent/model.onnx")),
            ..Default::default()
        };
        let mut model = load_model(&paths).unwrap();
        assert_eq!(model.name(), "histogram");
        assert!(!model.supports_text());

        let img = DynamicImage::new_rgb8(10, 10);
        let v = model.encode_image(&img).unwrap();
        assert_eq!(v.len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_clip_load_rejects_missing_file() {
        let paths = ClipPaths {
            visual: Some(PathBuf::from("/nonexistent/model.onnx")),
            ..Default::default()
        };
        assert!(matches!(
            ClipModel::load(&paths),
            Err(VisionError::ModelNotAvailable(_))
        ));
    }

    #[test]
    fn test_default_paths_filled() {
        let paths = ClipPaths::default().with_defaults();
        assert!(paths.visual.unwrap().ends_with(VISUAL_MODEL_FILENAME));
        assert!(paths.tokenizer.unwrap().ends_with(TOKENIZER_FILENAME));
    }

    #[test]
    fn test_pad_token_ids() {
        let short = pad_token_ids(&[49406, 320, 49407]);
        assert_eq!(short.len(), CLIP_CONTEXT_LEN);
        assert_eq!(&short[..3], &[49406, 320, 49407]);
        assert_eq!(short[76], CLIP_EOT_ID);

        let long: Vec<u32> = (0..100).collect();
        let truncated = pad_token_ids(&long);
        assert_eq!(truncated.len(), CLIP_CONTEXT_LEN);
        assert_eq!(truncated[0], 0);
        assert_eq!(truncated[76], CLIP_EOT_ID);
    }

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(&[3.0, 4.0]).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        assert!(l2_normalize(&[0.0, 0.0]).is_err());
        assert!(l2_normalize(&[]).is_err());
    }
}
