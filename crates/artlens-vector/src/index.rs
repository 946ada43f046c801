//! Vector index trait and types.
//!
//! Low-level nearest-neighbour index keyed by artwork object id.

use artlens_embeddings::Embedding;

use crate::error::VectorError;

/// Result of a vector search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Object id the vector was stored under
    pub id: u64,
    /// Cosine similarity (higher = more similar)
    pub score: f32,
}

impl SearchResult {
    pub fn new(id: u64, score: f32) -> Self {
        Self { id, score }
    }
}

/// Index statistics
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    /// Number of vectors in the index
    pub vector_count: usize,
    /// Embedding dimension
    pub dimension: usize,
    /// Reserved slots
    pub capacity: usize,
    /// Index file size in bytes
    pub size_bytes: u64,
}

/// Trait for vector indexes.
///
/// Implementations use interior mutability and must be safe to share
/// between threads.
pub trait VectorIndex: Send + Sync {
    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the number of vectors in the index
    fn len(&self) -> usize;

    /// Check if the index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a vector, replacing any vector already stored under `id`.
    fn upsert(&self, id: u64, embedding: &Embedding) -> Result<(), VectorError>;

    /// Search for k nearest neighbors, best first.
    fn search(&self, query: &Embedding, k: usize) -> Result<Vec<SearchResult>, VectorError>;

    /// Remove a vector by ID.
    fn remove(&self, id: u64) -> Result<bool, VectorError>;

    /// Check if a vector ID exists
    fn contains(&self, id: u64) -> bool;

    /// Get index statistics
    fn stats(&self) -> IndexStats;

    /// Save index to disk
    fn save(&self) -> Result<(), VectorError>;

    /// Clear all vectors from the index
    fn clear(&self) -> Result<(), VectorError>;
}
