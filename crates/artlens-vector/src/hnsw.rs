//! HNSW index implementation using usearch.
//!
//! Parameters tuned for quality over speed:
//! - M = 16 (connections per layer)
//! - ef_construction = 200 (build-time quality)
//! - ef_search = 100 (search-time quality)

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use artlens_embeddings::{Embedding, EMBEDDING_DIM};
use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::VectorError;
use crate::index::{IndexStats, SearchResult, VectorIndex};

/// File name of the persisted index inside the index directory
pub const INDEX_FILE: &str = "artworks.usearch";

/// HNSW index configuration
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Embedding dimension (must match model)
    pub dimension: usize,
    /// Number of connections per layer (M parameter)
    pub connectivity: usize,
    /// Build-time search depth (ef_construction)
    pub expansion_add: usize,
    /// Query-time search depth (ef_search)
    pub expansion_search: usize,
    /// Index directory
    pub index_path: PathBuf,
    /// Initial capacity; grows on demand
    pub capacity: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            dimension: EMBEDDING_DIM,
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 100,
            index_path: PathBuf::from("./vector-index"),
            capacity: 1024,
        }
    }
}

impl HnswConfig {
    pub fn new(dimension: usize, index_path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            index_path: index_path.into(),
            ..Default::default()
        }
    }

    pub fn with_connectivity(mut self, m: usize) -> Self {
        self.connectivity = m;
        self
    }

    pub fn with_expansion(mut self, ef_add: usize, ef_search: usize) -> Self {
        self.expansion_add = ef_add;
        self.expansion_search = ef_search;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimension,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false,
        }
    }
}

fn index_err(e: impl std::fmt::Display) -> VectorError {
    VectorError::Index(e.to_string())
}

/// HNSW index wrapper around usearch.
pub struct HnswIndex {
    index: RwLock<Index>,
    config: HnswConfig,
}

impl HnswIndex {
    /// Create a new HNSW index or open existing one.
    pub fn open_or_create(config: HnswConfig) -> Result<Self, VectorError> {
        let index_file = config.index_path.join(INDEX_FILE);

        let index = if index_file.exists() {
            info!(path = ?index_file, "Opening existing vector index");
            let idx = Index::new(&config.options()).map_err(index_err)?;
            idx.load(path_str(&index_file)?)
                .map_err(|e| VectorError::Index(format!("Failed to load: {}", e)))?;
            idx
        } else {
            info!(path = ?index_file, dim = config.dimension, "Creating new vector index");
            std::fs::create_dir_all(&config.index_path)?;
            Self::empty_index(&config)?
        };

        Ok(Self {
            index: RwLock::new(index),
            config,
        })
    }

    fn empty_index(config: &HnswConfig) -> Result<Index, VectorError> {
        let idx = Index::new(&config.options()).map_err(index_err)?;
        idx.reserve(config.capacity.max(1)).map_err(index_err)?;
        Ok(idx)
    }

    /// Get the index file path
    pub fn index_file(&self) -> PathBuf {
        self.config.index_path.join(INDEX_FILE)
    }

    /// Whether an index has been persisted at the configured path
    pub fn is_persisted(&self) -> bool {
        self.index_file().exists()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Index>, VectorError> {
        self.index.read().map_err(|_| VectorError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Index>, VectorError> {
        self.index.write().map_err(|_| VectorError::LockPoisoned)
    }

    fn check_dimension(&self, id: u64, embedding: &Embedding) -> Result<(), VectorError> {
        if embedding.dimension() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                id,
                expected: self.config.dimension,
                actual: embedding.dimension(),
            });
        }
        Ok(())
    }
}

fn path_str(path: &std::path::Path) -> Result<&str, VectorError> {
    path.to_str()
        .ok_or_else(|| VectorError::Index("Invalid path encoding".to_string()))
}

/// Double capacity when the next insert would not fit.
fn ensure_capacity(index: &Index, additional: usize) -> Result<(), VectorError> {
    let needed = index.size() + additional;
    if needed > index.capacity() {
        let target = needed.max(index.capacity() * 2);
        debug!(from = index.capacity(), to = target, "Growing vector index");
        index.reserve(target).map_err(index_err)?;
    }
    Ok(())
}

impl VectorIndex for HnswIndex {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn len(&self) -> usize {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .size()
    }

    #[allow(clippy::readonly_write_lock)] // usearch::Index uses interior mutability
    fn upsert(&self, id: u64, embedding: &Embedding) -> Result<(), VectorError> {
        self.check_dimension(id, embedding)?;

        let index = self.write()?;
        if index.contains(id) {
            index.remove(id).map_err(index_err)?;
        }
        ensure_capacity(&index, 1)?;

        if let Err(e) = index.add(id, &embedding.values) {
            // Removed slots may still count against capacity; grow once and retry.
            debug!(id, error = %e, "Insert failed, growing index");
            index
                .reserve((index.capacity() * 2).max(index.size() + 1))
                .map_err(index_err)?;
            index.add(id, &embedding.values).map_err(index_err)?;
        }

        debug!(id, "Upserted vector");
        Ok(())
    }

    fn search(&self, query: &Embedding, k: usize) -> Result<Vec<SearchResult>, VectorError> {
        self.check_dimension(0, query)?;

        let index = self.read()?;
        if k == 0 || index.size() == 0 {
            return Ok(vec![]);
        }

        let results = index.search(&query.values, k).map_err(index_err)?;

        // Convert distance to similarity
        let search_results: Vec<SearchResult> = results
            .keys
            .iter()
            .zip(results.distances.iter())
            .map(|(&id, &dist)| SearchResult::new(id, 1.0 - dist))
            .collect();

        debug!(k, found = search_results.len(), "Search complete");
        Ok(search_results)
    }

    #[allow(clippy::readonly_write_lock)] // usearch::Index uses interior mutability
    fn remove(&self, id: u64) -> Result<bool, VectorError> {
        let index = self.write()?;
        let removed = index.remove(id).map_err(index_err)?;

        if removed > 0 {
            debug!(id, "Removed vector");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn contains(&self, id: u64) -> bool {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    fn stats(&self) -> IndexStats {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let size_bytes = std::fs::metadata(self.index_file())
            .map(|m| m.len())
            .unwrap_or(0);

        IndexStats {
            vector_count: index.size(),
            dimension: self.config.dimension,
            capacity: index.capacity(),
            size_bytes,
        }
    }

    fn save(&self) -> Result<(), VectorError> {
        let index = self.read()?;
        std::fs::create_dir_all(&self.config.index_path)?;
        let path = self.index_file();
        index
            .save(path_str(&path)?)
            .map_err(|e| VectorError::Index(format!("Failed to save: {}", e)))?;

        info!(path = ?path, vectors = index.size(), "Saved vector index");
        Ok(())
    }

    fn clear(&self) -> Result<(), VectorError> {
        let fresh = Self::empty_index(&self.config)?;
        *self.write()? = fresh;
        info!("Cleared vector index");
        Ok(())
    }
}
