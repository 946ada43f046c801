//! # artlens-embeddings
//!
//! Image embedding generation for artlens using Candle.
//!
//! Turns artwork images into fixed-length feature vectors with a pretrained
//! ResNet-50 whose classification head has been removed. The same
//! preprocessing is applied at ingestion and at query time so vectors are
//! comparable.
//!
//! ## Features
//! - Local inference via Candle on the CPU
//! - ResNet-50 pooled features (2048 dimensions)
//! - Automatic weight caching from HuggingFace Hub
//! - Batch embedding with per-slot decode failures

pub mod cache;
pub mod candle;
pub mod error;
pub mod model;
pub mod preprocess;

pub use crate::candle::{CandleEmbedder, EMBEDDING_DIM};
pub use cache::{get_or_download_weights, ModelCache, DEFAULT_MODEL_REPO, DEFAULT_WEIGHTS_FILE};
pub use error::EmbeddingError;
pub use model::{Embedding, ImageEmbedder, ModelInfo};
pub use preprocess::{preprocess, CROP_SIZE, RESIZE_SHORT_SIDE};
