//! Candle-based image embedder.
//!
//! Uses ResNet-50 with the classification head removed, giving one
//! 2048-dimensional pooled feature vector per image.

use std::path::Path;
use std::sync::Mutex;

use candle_core::{DType, Device, Tensor};
use candle_nn::{Func, Module, VarBuilder};
use candle_transformers::models::resnet::resnet50_no_final_layer;
use tracing::{debug, info};

use crate::cache::{get_or_download_weights, ModelCache};
use crate::error::EmbeddingError;
use crate::model::{Embedding, ImageEmbedder, ModelInfo};
use crate::preprocess::CROP_SIZE;

/// Embedding dimension for ResNet-50 pooled features
pub const EMBEDDING_DIM: usize = 2048;

/// Candle-based embedder using ResNet-50.
///
/// Loaded once per process and shared behind an `Arc`. Forward passes are
/// serialized: the model is never invoked from two threads at once.
pub struct CandleEmbedder {
    model: Mutex<Func<'static>>,
    device: Device,
    info: ModelInfo,
}

impl CandleEmbedder {
    /// Load the model from cache (downloading if needed).
    pub fn load(cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let weights = get_or_download_weights(cache)?;
        Self::load_from_path(&weights)
    }

    /// Load with default cache settings
    pub fn load_default() -> Result<Self, EmbeddingError> {
        let cache = ModelCache::default();
        Self::load(&cache)
    }

    /// Load from an explicit safetensors file
    pub fn load_from_path(weights_path: &Path) -> Result<Self, EmbeddingError> {
        info!(path = ?weights_path, "Loading embedding model...");

        if !weights_path.exists() {
            return Err(EmbeddingError::ModelNotFound(
                weights_path.display().to_string(),
            ));
        }

        // CPU only; accelerator support can be added behind feature flags
        let device = Device::Cpu;

        // SAFETY: the weights file is memory-mapped read-only and not modified while loaded.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };
        let model = resnet50_no_final_layer(vb)?;

        info!(dim = EMBEDDING_DIM, input = CROP_SIZE, "Model loaded successfully");

        Ok(Self {
            model: Mutex::new(model),
            device,
            info: ModelInfo {
                name: "resnet50".to_string(),
                dimension: EMBEDDING_DIM,
                input_size: CROP_SIZE,
            },
        })
    }

    /// Stack prepared inputs into one (N, 3, 224, 224) tensor.
    fn batch_tensor(&self, inputs: &[Vec<f32>]) -> Result<Tensor, EmbeddingError> {
        let side = CROP_SIZE as usize;
        let expected = 3 * side * side;
        let tensors = inputs
            .iter()
            .map(|input| {
                if input.len() != expected {
                    return Err(EmbeddingError::InvalidInput(format!(
                        "prepared input has {} values, expected {}",
                        input.len(),
                        expected
                    )));
                }
                Ok(Tensor::from_slice(input.as_slice(), (3, side, side), &self.device)?)
            })
            .collect::<Result<Vec<_>, EmbeddingError>>()?;
        Ok(Tensor::stack(&tensors, 0)?)
    }
}

impl ImageEmbedder for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed_prepared(&self, inputs: &[Vec<f32>]) -> Result<Vec<Embedding>, EmbeddingError> {
        if inputs.is_empty() {
            return Ok(vec![]);
        }

        debug!(count = inputs.len(), "Embedding batch");

        let input = self.batch_tensor(inputs)?;

        let features = {
            let model = self.model.lock().map_err(|_| EmbeddingError::LockPoisoned)?;
            model.forward(&input)?
        };

        // (N, 2048) after pooling; flatten anything trailing just in case.
        let features = features.flatten_from(1)?;
        let rows: Vec<Vec<f32>> = features.to_vec2()?;

        if rows.len() != inputs.len() {
            return Err(EmbeddingError::BatchMismatch {
                inputs: inputs.len(),
                outputs: rows.len(),
            });
        }

        let embeddings = rows
            .into_iter()
            .map(|row| {
                if row.len() != EMBEDDING_DIM {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: EMBEDDING_DIM,
                        actual: row.len(),
                    });
                }
                Ok(Embedding::new(row))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = embeddings.len(), dim = EMBEDDING_DIM, "Batch complete");

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    // Integration tests require model download, run with:
    // cargo test -p artlens-embeddings -- --ignored

    fn gradient_png() -> Vec<u8> {
        let mut img = RgbImage::new(320, 240);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgb([(x % 256) as u8, (y % 256) as u8, 128]);
        }
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_missing_weights_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let result = CandleEmbedder::load_from_path(&temp.path().join("nope.safetensors"));
        assert!(matches!(result, Err(EmbeddingError::ModelNotFound(_))));
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_rejects_wrong_input_size() {
        let embedder = CandleEmbedder::load_default().unwrap();
        let result = embedder.embed_prepared(&[vec![0.0; 12]]);
        assert!(matches!(result, Err(EmbeddingError::InvalidInput(_))));
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_load_model() {
        let embedder = CandleEmbedder::load_default().unwrap();
        assert_eq!(embedder.info().dimension, EMBEDDING_DIM);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_embed_batch_dimensions() {
        let embedder = CandleEmbedder::load_default().unwrap();
        let png = gradient_png();
        let out = embedder
            .embed_bytes(&[png.as_slice(), png.as_slice(), png.as_slice()])
            .unwrap();
        assert_eq!(out.len(), 3);
        for emb in out {
            assert_eq!(emb.unwrap().dimension(), EMBEDDING_DIM);
        }
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_embedding_is_deterministic() {
        let embedder = CandleEmbedder::load_default().unwrap();
        let png = gradient_png();

        let first = embedder.embed_bytes(&[png.as_slice()]).unwrap();
        let second = embedder.embed_bytes(&[png.as_slice()]).unwrap();

        let a = first[0].as_ref().unwrap();
        let b = second[0].as_ref().unwrap();
        assert!(a
            .values
            .iter()
            .zip(b.values.iter())
            .all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_singleton_batch_matches_larger_batch() {
        let embedder = CandleEmbedder::load_default().unwrap();
        let png = gradient_png();
        let img = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();

        let single = embedder.embed_images(std::slice::from_ref(&img)).unwrap();
        let pair = embedder.embed_images(&[img.clone(), img]).unwrap();

        assert!(single[0].cosine_similarity(&pair[1]) > 0.999);
    }
}
