//! Shoplens vision: image variants, embedding generation, hybrid similarity
//! scoring and diversity reranking.

pub mod capture;
pub mod embedding;
pub mod fallback;
pub mod generator;
pub mod rerank;
pub mod similarity;
pub mod transform;
pub mod types;

pub use capture::{decode_image, is_supported_format, load_image_file};
pub use embedding::{
    l2_normalize, load_model, ClipModel, ClipPaths, EmbeddingModel, EMBEDDING_DIM,
};
pub use fallback::HistogramModel;
pub use generator::{embed_image, embed_text, DEFAULT_QUERY_DESCRIPTION};
pub use rerank::{diversify, Rankable, DEFAULT_DIVERSITY_WEIGHT};
pub use similarity::{cosine_similarity, score, ScoreMode, DEFAULT_TEXT_WEIGHT};
pub use types::*;
