//! Artwork vector store.
//!
//! Pairs the HNSW index with the payload store behind one async interface
//! used by ingestion (write path) and search (read path).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use artlens_embeddings::Embedding;
use artlens_types::{ArtworkPayload, Settings};

use crate::error::VectorError;
use crate::hnsw::{HnswConfig, HnswIndex};
use crate::index::VectorIndex;
use crate::metadata::{PayloadStore, StoredEntry};

/// A vector ready to be written, keyed by catalog object id.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: u64,
    pub vector: Embedding,
    pub payload: ArtworkPayload,
}

impl IndexRecord {
    pub fn new(id: u64, vector: Embedding, payload: ArtworkPayload) -> Self {
        Self {
            id,
            vector,
            payload,
        }
    }
}

/// A search match with its stored payload, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: u64,
    /// Cosine similarity, higher is closer
    pub score: f32,
    pub payload: Option<ArtworkPayload>,
}

/// Store statistics
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub vector_count: usize,
    pub payload_count: usize,
    pub dimension: usize,
    pub index_path: PathBuf,
    pub size_bytes: u64,
}

/// Searchable collection of artwork vectors with metadata.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Dimension every stored vector must have
    fn dimension(&self) -> usize;

    /// Initialise an empty collection.
    ///
    /// Fails with [`VectorError::CollectionExists`] when data is already
    /// present, unless `recreate` is set, in which case everything is wiped.
    async fn create_collection(&self, recreate: bool) -> Result<(), VectorError>;

    /// Insert or overwrite records by id. Returns the number written.
    ///
    /// Every vector is validated before anything is written.
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<usize, VectorError>;

    /// Nearest neighbours of `query`, best first, at most `limit`.
    async fn search(&self, query: &Embedding, limit: usize)
        -> Result<Vec<ScoredPoint>, VectorError>;

    async fn get_payload(&self, id: u64) -> Result<Option<ArtworkPayload>, VectorError>;

    async fn stats(&self) -> Result<StoreStats, VectorError>;

    /// Persist the index to disk.
    async fn flush(&self) -> Result<(), VectorError>;
}

/// Run blocking store work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, VectorError>
where
    F: FnOnce() -> Result<T, VectorError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VectorError::Task(e.to_string()))?
}

/// On-disk store: usearch index file plus RocksDB payloads.
pub struct LocalVectorStore {
    index: Arc<HnswIndex>,
    payloads: Arc<PayloadStore>,
}

impl LocalVectorStore {
    /// Open or create both halves of the store.
    pub fn open(config: HnswConfig, payload_path: impl Into<PathBuf>) -> Result<Self, VectorError> {
        let payload_path = payload_path.into();
        let index = HnswIndex::open_or_create(config)?;
        let payloads = PayloadStore::open(&payload_path)?;

        Ok(Self {
            index: Arc::new(index),
            payloads: Arc::new(payloads),
        })
    }

    /// Open the store at the locations named in settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, VectorError> {
        let config = HnswConfig::new(settings.dimension, settings.expanded_index_path());
        Self::open(config, settings.expanded_payload_db_path())
    }

    fn validate(&self, records: &[IndexRecord]) -> Result<(), VectorError> {
        let expected = self.index.dimension();
        match records.iter().find(|r| r.vector.dimension() != expected) {
            Some(bad) => Err(VectorError::DimensionMismatch {
                id: bad.id,
                expected,
                actual: bad.vector.dimension(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    fn dimension(&self) -> usize {
        self.index.dimension()
    }

    async fn create_collection(&self, recreate: bool) -> Result<(), VectorError> {
        let index = self.index.clone();
        let payloads = self.payloads.clone();

        blocking(move || {
            let exists = index.is_persisted() || !index.is_empty();
            if exists && !recreate {
                return Err(VectorError::CollectionExists(
                    index.index_file().display().to_string(),
                ));
            }

            index.clear()?;
            payloads.clear()?;
            index.save()?;
            info!(dim = index.dimension(), recreate, "Created collection");
            Ok(())
        })
        .await
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<usize, VectorError> {
        if records.is_empty() {
            return Ok(0);
        }
        self.validate(&records)?;

        let index = self.index.clone();
        let payloads = self.payloads.clone();

        blocking(move || {
            let entries: Vec<(u64, StoredEntry)> = records
                .iter()
                .map(|r| (r.id, StoredEntry::new(r.payload.clone())))
                .collect();
            payloads.put_batch(&entries)?;

            for record in &records {
                index.upsert(record.id, &record.vector)?;
            }

            debug!(count = records.len(), "Upserted records");
            Ok(records.len())
        })
        .await
    }

    async fn search(
        &self,
        query: &Embedding,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorError> {
        let index = self.index.clone();
        let payloads = self.payloads.clone();
        let query = query.clone();

        blocking(move || {
            let results = index.search(&query, limit)?;
            results
                .into_iter()
                .map(|r| -> Result<ScoredPoint, VectorError> {
                    let payload = payloads.get(r.id)?.map(|e| e.payload);
                    Ok(ScoredPoint {
                        id: r.id,
                        score: r.score,
                        payload,
                    })
                })
                .collect()
        })
        .await
    }

    async fn get_payload(&self, id: u64) -> Result<Option<ArtworkPayload>, VectorError> {
        let payloads = self.payloads.clone();
        blocking(move || Ok(payloads.get(id)?.map(|e| e.payload))).await
    }

    async fn stats(&self) -> Result<StoreStats, VectorError> {
        let index = self.index.clone();
        let payloads = self.payloads.clone();

        blocking(move || {
            let index_stats = index.stats();
            Ok(StoreStats {
                vector_count: index_stats.vector_count,
                payload_count: payloads.count()?,
                dimension: index_stats.dimension,
                index_path: index.index_file(),
                size_bytes: index_stats.size_bytes,
            })
        })
        .await
    }

    async fn flush(&self) -> Result<(), VectorError> {
        let index = self.index.clone();
        let payloads = self.payloads.clone();

        blocking(move || {
            payloads.flush()?;
            index.save()
        })
        .await
    }
}
