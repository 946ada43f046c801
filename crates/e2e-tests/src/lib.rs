//! End-to-end test infrastructure for artlens.
//!
//! Provides a shared TestHarness plus stub image sources and embedders for
//! E2E tests covering catalog ingestion through search.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use artlens_catalog::{CatalogReader, ImageSource};
use artlens_embeddings::{Embedding, EmbeddingError, ImageEmbedder, ModelInfo};
use artlens_indexing::{BatchEmbeddingPipeline, IngestConfig, Ingestor};
use artlens_types::ArtworkPayload;
use artlens_vector::{
    HnswConfig, IndexRecord, LocalVectorStore, ScoredPoint, StoreStats, VectorError, VectorStore,
};

/// Dimension produced by [`MeanColorEmbedder`].
pub const STUB_DIM: usize = 3;

/// Shared test harness for E2E tests.
///
/// Owns a temp directory holding the vector store and any catalog files a
/// test writes.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub store: Arc<LocalVectorStore>,
    pub index_path: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let index_path = temp_dir.path().join("index");
        let store = LocalVectorStore::open(
            HnswConfig::new(STUB_DIM, &index_path).with_capacity(16),
            temp_dir.path().join("payloads"),
        )
        .expect("Failed to open test store");

        Self {
            _temp_dir: temp_dir,
            store: Arc::new(store),
            index_path,
        }
    }

    /// Write a catalog CSV with the given `(object id, title, classification)` rows.
    pub fn write_catalog(&self, name: &str, rows: &[(u64, &str, &str)]) -> PathBuf {
        let path = self._temp_dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("Failed to create catalog");
        writeln!(
            file,
            "Object ID,Title,Artist Display Name,Object Date,Classification,Link Resource"
        )
        .unwrap();
        for (id, title, classification) in rows {
            writeln!(
                file,
                "{id},{title},Artist {id},19{:02},{classification},http://met/{id}",
                id % 100
            )
            .unwrap();
        }
        path
    }

    /// Open a reader over a catalog written by [`write_catalog`](Self::write_catalog).
    pub fn reader(&self, path: &Path, classification: Option<&str>) -> CatalogReader {
        CatalogReader::open(path, classification.map(str::to_string))
            .expect("Failed to open catalog")
    }

    /// Build an ingestor over this harness's store.
    pub fn ingestor(
        &self,
        source: Arc<dyn ImageSource>,
        embedder: Arc<dyn ImageEmbedder>,
        config: IngestConfig,
    ) -> Ingestor {
        Ingestor::new(
            BatchEmbeddingPipeline::new(source, embedder),
            self.store.clone(),
            config,
        )
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a small solid-color PNG.
pub fn png(color: [u8; 3]) -> Bytes {
    let img = RgbImage::from_pixel(8, 8, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .expect("Failed to encode PNG");
    Bytes::from(buf.into_inner())
}

/// Distinct color per object id, never black.
pub fn color_for(id: u64) -> [u8; 3] {
    [
        (id % 200) as u8 + 20,
        ((id * 7) % 200) as u8 + 20,
        ((id * 13) % 200) as u8 + 20,
    ]
}

/// Counts how many times the owning source was released.
struct Session {
    drops: Arc<AtomicUsize>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory image source with per-object latency.
///
/// Records how often it is dropped so tests can check that the network
/// session is released exactly once.
pub struct StubImageSource {
    images: HashMap<u64, Bytes>,
    latency: HashMap<u64, Duration>,
    fetches: AtomicUsize,
    _session: Session,
}

impl StubImageSource {
    /// Returns the source and a counter of session releases.
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let source = Self {
            images: HashMap::new(),
            latency: HashMap::new(),
            fetches: AtomicUsize::new(0),
            _session: Session {
                drops: drops.clone(),
            },
        };
        (source, drops)
    }

    pub fn with_image(mut self, id: u64, bytes: Bytes) -> Self {
        self.images.insert(id, bytes);
        self
    }

    /// Solid-color image for `id` using [`color_for`].
    pub fn with_artwork(self, id: u64) -> Self {
        self.with_image(id, png(color_for(id)))
    }

    pub fn with_latency(mut self, id: u64, delay: Duration) -> Self {
        self.latency.insert(id, delay);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSource for StubImageSource {
    async fn fetch(&self, object_id: u64) -> Option<Bytes> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.latency.get(&object_id) {
            tokio::time::sleep(*delay).await;
        }
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

impl Default for MeanColorEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageEmbedder for MeanColorEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn prepare(&self, image: &DynamicImage) -> Vec<f32> {
        mean_color(image)
    }

    fn embed_prepared(&self, inputs: &[Vec<f32>]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(inputs.iter().cloned().map(Embedding::new).collect())
    }
}

fn mean_color(img: &DynamicImage) -> Vec<f32> {
    let rgb = img.to_rgb8();
    let n = (rgb.width() * rgb.height()).max(1) as f32;
    let mut sum = [0f32; STUB_DIM];
    for px in rgb.pixels() {
        for (s, c) in sum.iter_mut().zip(px.0) {
            *s += c as f32;
        }
    }
    sum.iter().map(|s| s / n).collect()
}

/// Store wrapper whose upserts fail for batches containing a given id.
pub struct FailingStore {
    inner: Arc<LocalVectorStore>,
    poison_id: u64,
}

impl FailingStore {
    pub fn new(inner: Arc<LocalVectorStore>, poison_id: u64) -> Self {
        Self { inner, poison_id }
    }
}

#[async_trait]
impl VectorStore for FailingStore {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn create_collection(&self, recreate: bool) -> Result<(), VectorError> {
        self.inner.create_collection(recreate).await
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<usize, VectorError> {
        if records.iter().any(|r| r.id == self.poison_id) {
            return Err(VectorError::Index(format!(
                "simulated failure for {}",
                self.poison_id
            )));
        }
        self.inner.upsert(records).await
    }

    async fn search(
        &self,
        query: &Embedding,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorError> {
        self.inner.search(query, limit).await
    }

    async fn get_payload(&self, id: u64) -> Result<Option<ArtworkPayload>, VectorError> {
        self.inner.get_payload(id).await
    }

    async fn stats(&self) -> Result<StoreStats, VectorError> {
        self.inner.stats().await
    }

    async fn flush(&self) -> Result<(), VectorError> {
        self.inner.flush().await
    }
}

/// Random unit-scale vector for seeding a store directly.
pub fn random_vector(rng: &mut impl rand::Rng) -> Embedding {
    Embedding::new((0..STUB_DIM).map(|_| rng.random_range(1.0..255.0)).collect())
}
