//! # artlens-vector
//!
//! Artwork vector store for artlens.
//!
//! Stores one embedding per catalog object in an HNSW index (usearch,
//! cosine metric) and the artwork metadata in RocksDB, keyed by the same
//! object id. Re-ingesting an id overwrites both.
//!
//! ## Features
//! - usearch-powered HNSW index persisted to a single file
//! - Capacity grows on demand
//! - Payload storage with atomic batch writes
//! - Async [`VectorStore`] trait used by ingestion and search

pub mod error;
pub mod hnsw;
pub mod index;
pub mod metadata;
pub mod store;

pub use error::VectorError;
pub use hnsw::{HnswConfig, HnswIndex, INDEX_FILE};
pub use index::{IndexStats, SearchResult, VectorIndex};
pub use metadata::{PayloadStore, StoredEntry, CF_ARTWORK_PAYLOAD};
pub use store::{IndexRecord, LocalVectorStore, ScoredPoint, StoreStats, VectorStore};
