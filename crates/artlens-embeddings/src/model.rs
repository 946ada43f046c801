//! Embedding model trait and types.
//!
//! Defines the interface for turning decoded images into vectors.

use image::DynamicImage;
use tracing::{debug, warn};

use crate::error::EmbeddingError;
use crate::preprocess::preprocess;

/// Image embedding - a fixed-length float vector.
///
/// Values are kept exactly as produced by the model so the same input always
/// yields a bit-identical vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Get the embedding dimension
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Euclidean norm of the vector
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Compute cosine similarity with another embedding.
    /// Returns value in [-1, 1] range (1 = same direction).
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        let denom = self.norm() * other.norm();
        if denom == 0.0 {
            return 0.0;
        }
        let dot: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum();
        dot / denom
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name (e.g., "resnet50")
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Square input side after preprocessing
    pub input_size: u32,
}

/// Trait for image embedding models.
///
/// Embedding is split in two steps: [`prepare`](Self::prepare) reduces one
/// decoded image to the model's input buffer, and
/// [`embed_prepared`](Self::embed_prepared) runs the model on a batch of
/// those buffers. Full-size decoded images never outlive their own
/// `prepare` call.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
pub trait ImageEmbedder: Send + Sync {
    /// Get model information
    fn info(&self) -> &ModelInfo;

    /// Reduce one decoded image to a model input.
    fn prepare(&self, image: &DynamicImage) -> Vec<f32> {
        preprocess(image)
    }

    /// Embed prepared inputs, one vector per input in input order.
    fn embed_prepared(&self, inputs: &[Vec<f32>]) -> Result<Vec<Embedding>, EmbeddingError>;

    /// Embed decoded images, one vector per image in input order.
    fn embed_images(&self, images: &[DynamicImage]) -> Result<Vec<Embedding>, EmbeddingError> {
        let inputs: Vec<Vec<f32>> = images.iter().map(|img| self.prepare(img)).collect();
        self.embed_prepared(&inputs)
    }

    /// Decode and embed raw image payloads.
    ///
    /// The returned vector has one slot per payload. Payloads that cannot be
    /// decoded get `None`. Each payload is decoded and prepared on its own,
    /// then every prepared input is embedded in a single `embed_prepared`
    /// call.
    fn embed_bytes(&self, payloads: &[&[u8]]) -> Result<Vec<Option<Embedding>>, EmbeddingError> {
        let mut slots = Vec::with_capacity(payloads.len());
        let mut inputs = Vec::with_capacity(payloads.len());

        for (i, bytes) in payloads.iter().enumerate() {
            match image::load_from_memory(bytes) {
                Ok(img) => {
                    slots.push(Some(inputs.len()));
                    inputs.push(self.prepare(&img));
                }
                Err(e) => {
                    warn!(slot = i, error = %e, "Skipping undecodable image");
                    slots.push(None);
                }
            }
        }

        if inputs.is_empty() {
            debug!(count = payloads.len(), "No decodable images in batch");
            return Ok(vec![None; payloads.len()]);
        }

        let decoded = inputs.len();
        let mut vectors: Vec<Option<Embedding>> =
            self.embed_prepared(&inputs)?.into_iter().map(Some).collect();
        if vectors.len() != decoded {
            return Err(EmbeddingError::BatchMismatch {
                inputs: decoded,
                outputs: vectors.len(),
            });
        }

        Ok(slots
            .into_iter()
            .map(|slot| slot.and_then(|idx| vectors[idx].take()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Embeds an image as its mean RGB value.
    ///
    /// Records the size of every prepared input and every batch handed to
    /// the model.
    struct MeanColorEmbedder {
        info: ModelInfo,
        prepared: Mutex<Vec<(u32, u32)>>,
        batches: Mutex<Vec<usize>>,
    }

    impl MeanColorEmbedder {
        fn new() -> Self {
            Self {
                info: ModelInfo {
                    name: "mean-color".to_string(),
                    dimension: 3,
                    input_size: 1,
                },
                prepared: Mutex::new(vec![]),
                batches: Mutex::new(vec![]),
            }
        }
    }

    impl ImageEmbedder for MeanColorEmbedder {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        fn prepare(&self, image: &DynamicImage) -> Vec<f32> {
            let rgb = image.to_rgb8();
            self.prepared.lock().unwrap().push(rgb.dimensions());
            let n = (rgb.width() * rgb.height()) as f32;
            let mut sum = [0.0f32; 3];
            for px in rgb.pixels() {
                for c in 0..3 {
                    sum[c] += px[c] as f32;
                }
            }
            sum.iter().map(|s| s / n).collect()
        }

        fn embed_prepared(&self, inputs: &[Vec<f32>]) -> Result<Vec<Embedding>, EmbeddingError> {
            self.batches.lock().unwrap().push(inputs.len());
            Ok(inputs.iter().cloned().map(Embedding::new).collect())
        }
    }

    fn png(color: [u8; 3]) -> Vec<u8> {
        png_sized(4, 4, color)
    }

    fn png_sized(w: u32, h: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb(color));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let emb1 = Embedding::new(vec![1.0, 2.0, 3.0]);
        let emb2 = Embedding::new(vec![1.0, 2.0, 3.0]);
        assert!((emb1.cosine_similarity(&emb2) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let emb1 = Embedding::new(vec![1.0, 0.0]);
        let emb2 = Embedding::new(vec![0.0, 5.0]);
        assert!(emb1.cosine_similarity(&emb2).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let emb1 = Embedding::new(vec![0.0, 0.0]);
        let emb2 = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(emb1.cosine_similarity(&emb2), 0.0);
    }

    #[test]
    fn test_embed_bytes_keeps_slots_for_undecodable_payloads() {
        let embedder = MeanColorEmbedder::new();
        let red = png([255, 0, 0]);
        let blue = png([0, 0, 255]);
        let garbage = b"definitely not an image".to_vec();

        let out = embedder
            .embed_bytes(&[red.as_slice(), garbage.as_slice(), blue.as_slice()])
            .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_ref().unwrap().values, vec![255.0, 0.0, 0.0]);
        assert!(out[1].is_none());
        assert_eq!(out[2].as_ref().unwrap().values, vec![0.0, 0.0, 255.0]);
    }

    #[test]
    fn test_embed_bytes_all_undecodable() {
        let embedder = MeanColorEmbedder::new();
        let out = embedder.embed_bytes(&[b"a".as_slice(), b"".as_slice()]).unwrap();
        assert_eq!(out, vec![None, None]);
    }

    #[test]
    fn test_embed_bytes_rejects_short_model_output() {
        struct Lossy(ModelInfo);
        impl ImageEmbedder for Lossy {
            fn info(&self) -> &ModelInfo {
                &self.0
            }
            fn embed_prepared(&self, _: &[Vec<f32>]) -> Result<Vec<Embedding>, EmbeddingError> {
                Ok(vec![])
            }
        }

        let embedder = Lossy(MeanColorEmbedder::new().info);
        let red = png([255, 0, 0]);
        let result = embedder.embed_bytes(&[red.as_slice()]);
        assert!(matches!(
            result,
            Err(EmbeddingError::BatchMismatch { inputs: 1, outputs: 0 })
        ));
    }

    #[test]
    fn test_embed_bytes_prepares_each_image_before_the_batch() {
        let embedder = MeanColorEmbedder::new();
        let large = png_sized(640, 480, [10, 20, 30]);
        let small = png_sized(16, 16, [200, 100, 50]);
        let garbage = b"not an image".to_vec();

        let out = embedder
            .embed_bytes(&[large.as_slice(), garbage.as_slice(), small.as_slice()])
            .unwrap();

        // Each decodable payload was prepared once, in order, and the model
        // saw one batch holding only the compact prepared inputs.
        assert_eq!(
            *embedder.prepared.lock().unwrap(),
            vec![(640, 480), (16, 16)]
        );
        assert_eq!(*embedder.batches.lock().unwrap(), vec![2]);
        assert_eq!(out[0].as_ref().unwrap().values, vec![10.0, 20.0, 30.0]);
        assert!(out[1].is_none());
        assert_eq!(out[2].as_ref().unwrap().values, vec![200.0, 100.0, 50.0]);
    }

    #[test]
    fn test_embed_images_uses_prepare() {
        let embedder = MeanColorEmbedder::new();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 5, Rgb([9, 8, 7])));

        let out = embedder.embed_images(&[img.clone(), img]).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[1].values, vec![9.0, 8.0, 7.0]);
        assert_eq!(embedder.prepared.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_default_prepare_matches_preprocess() {
        struct Plain(ModelInfo);
        impl ImageEmbedder for Plain {
            fn info(&self) -> &ModelInfo {
                &self.0
            }
            fn embed_prepared(&self, inputs: &[Vec<f32>]) -> Result<Vec<Embedding>, EmbeddingError> {
                Ok(inputs.iter().cloned().map(Embedding::new).collect())
            }
        }

        let embedder = Plain(MeanColorEmbedder::new().info);
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 260, Rgb([40, 90, 160])));
        assert_eq!(embedder.prepare(&img), preprocess(&img));
    }
}
