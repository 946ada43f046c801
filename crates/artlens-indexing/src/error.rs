//! Error types for the embedding pipeline and ingestion.

use artlens_catalog::CatalogError;
use artlens_embeddings::EmbeddingError;
use artlens_vector::VectorError;
use thiserror::Error;

/// Failure of one sub-batch in the embedding pipeline.
///
/// Distinct from per-image failures, which only drop the affected record.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The fetcher broke positional correspondence
    #[error("Fetch count mismatch: {requested} ids requested, {returned} results returned")]
    FetchCountMismatch { requested: usize, returned: usize },

    /// The model returned a different number of vectors than images given
    #[error("Vector count mismatch: {images} images, {vectors} vectors")]
    VectorCountMismatch { images: usize, vectors: usize },

    /// Model inference failed for the whole batch
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Blocking inference task failed to complete
    #[error("Embedding task failed: {0}")]
    Task(String),
}

/// Errors that abort an ingestion run
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Catalog could not be read
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Vector store operation failed
    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    /// Pipeline failure surfaced to the caller
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid run configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
