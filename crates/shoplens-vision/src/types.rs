//! Core data types shared by the embedding, scoring and reranking stages.

use serde::{Deserialize, Serialize};

/// The fixed photographic transforms applied to every source image, in
/// generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Identity,
    CenterCrop,
    Contrast,
    Brightness,
    Blur,
}

impl Variant {
    /// All variants in the order they are generated.
    pub const ALL: [Variant; 5] = [
        Variant::Identity,
        Variant::CenterCrop,
        Variant::Contrast,
        Variant::Brightness,
        Variant::Blur,
    ];
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::CenterCrop => write!(f, "center-crop"),
            Self::Contrast => write!(f, "contrast"),
            Self::Brightness => write!(f, "brightness"),
            Self::Blur => write!(f, "blur"),
        }
    }
}

/// Unit-normalized embeddings derived from one source image.
///
/// `vectors[i]` is the embedding of `variants[i]`. Every vector has an
/// L2 norm of 1 (within float tolerance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSet {
    pub variants: Vec<Variant>,
    pub vectors: Vec<Vec<f32>>,
    /// Optional text embedding associated with the image (unit-normalized).
    pub text: Option<Vec<f32>>,
}

impl EmbeddingSet {
    /// Number of image vectors in the set.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Dimension of the image vectors, or 0 for an empty set.
    pub fn dim(&self) -> usize {
        self.vectors.first().map(Vec::len).unwrap_or(0)
    }

    /// Attach a text embedding to this set.
    pub fn with_text(mut self, text: Vec<f32>) -> Self {
        self.text = Some(text);
        self
    }
}

/// Errors that can occur in the vision library.
#[derive(thiserror::Error, Debug)]
pub enum VisionError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
}

/// Convenience result type.
pub type VisionResult<T> = Result<T, VisionError>;
