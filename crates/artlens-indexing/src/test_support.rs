//! Stub collaborators shared by the unit tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use artlens_catalog::ImageSource;
use artlens_embeddings::{Embedding, EmbeddingError, ImageEmbedder, ModelInfo};

pub const STUB_DIM: usize = 3;

/// Encode a small solid-color PNG.
pub fn png(color: [u8; 3]) -> Bytes {
    let img = RgbImage::from_pixel(8, 8, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    Bytes::from(buf.into_inner())
}

/// Distinct color per object id, never black.
pub fn color_for(id: u64) -> [u8; 3] {
    [(id % 200) as u8 + 20, ((id * 7) % 200) as u8 + 20, ((id * 13) % 200) as u8 + 20]
}

/// In-memory image source.
#[derive(Default)]
pub struct MapSource {
    images: HashMap<u64, Bytes>,
}

impl MapSource {
    pub fn with_image(mut self, id: u64, bytes: Bytes) -> Self {
        self.images.insert(id, bytes);
        self
    }
}

#[async_trait]
impl ImageSource for MapSource {
    async fn fetch(&self, object_id: u64) -> Option<Bytes> {
        self.images.get(&object_id).cloned()
    }
}

/// Embeds an image as its mean RGB color and counts model calls.
pub struct MeanColorEmbedder {
    info: ModelInfo,
    calls: AtomicUsize,
}

impl MeanColorEmbedder {
    pub fn new() -> Self {
        Self {
            info: ModelInfo {
                name: "mean-color".to_string(),
                dimension: STUB_DIM,
                input_size: 8,
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageEmbedder for MeanColorEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn prepare(&self, image: &DynamicImage) -> Vec<f32> {
        let rgb = image.to_rgb8();
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
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(inputs.iter().cloned().map(Embedding::new).collect())
    }
}

/// Returns one vector fewer than the payloads it was given.
pub struct ShortBatchEmbedder(pub MeanColorEmbedder);

impl ImageEmbedder for ShortBatchEmbedder {
    fn info(&self) -> &ModelInfo {
        self.0.info()
    }

    fn prepare(&self, image: &DynamicImage) -> Vec<f32> {
        self.0.prepare(image)
    }

    fn embed_prepared(&self, inputs: &[Vec<f32>]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.0.embed_prepared(inputs)
    }

    fn embed_bytes(&self, payloads: &[&[u8]]) -> Result<Vec<Option<Embedding>>, EmbeddingError> {
        let mut out = self.0.embed_bytes(payloads)?;
        out.pop();
        Ok(out)
    }
}

/// Always fails inference.
pub struct FailingEmbedder(pub ModelInfo);

impl ImageEmbedder for FailingEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.0
    }

    fn embed_prepared(&self, _: &[Vec<f32>]) -> Result<Vec<Embedding>, EmbeddingError> {
        Err(EmbeddingError::InvalidInput("model unavailable".to_string()))
    }
}
