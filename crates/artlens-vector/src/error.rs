//! Vector store error types.

use thiserror::Error;

/// Errors that can occur during vector operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// usearch index error
    #[error("Index error: {0}")]
    Index(String),

    /// Dimension mismatch
    #[error("Dimension mismatch for id {id}: expected {expected}, got {actual}")]
    DimensionMismatch {
        id: u64,
        expected: usize,
        actual: usize,
    },

    /// Collection already holds data and recreation was not requested
    #[error("Collection already exists at {0}")]
    CollectionExists(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// RocksDB error
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// Column family missing from an opened database
    #[error("Column family missing: {0}")]
    MissingColumnFamily(&'static str),

    /// Index lock was poisoned by a panicking writer
    #[error("Index lock poisoned")]
    LockPoisoned,

    /// Blocking task failed to complete
    #[error("Background task failed: {0}")]
    Task(String),
}
