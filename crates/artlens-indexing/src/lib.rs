//! Batch embedding and catalog ingestion for artlens.
//!
//! ## Key Components
//!
//! - [`BatchEmbeddingPipeline`]: fetches one sub-batch of images concurrently
//!   and embeds the survivors in a single model call
//! - [`Ingestor`]: streams the catalog in chunks and upserts every sub-batch
//!   into the vector store, isolating per-batch failures
//! - [`ProgressCallback`]: receives running [`IngestStats`] after each
//!   sub-batch
//!
//! ## Example
//!
//! ```ignore
//! use artlens_indexing::{BatchEmbeddingPipeline, IngestConfig, Ingestor, LoggingProgressCallback};
//!
//! let pipeline = BatchEmbeddingPipeline::new(fetcher, embedder);
//! let mut ingestor = Ingestor::new(pipeline, store, IngestConfig::default());
//! let mut reader = CatalogReader::open("paintings.csv", Some("Paintings".into()))?;
//! let stats = ingestor.run(&mut reader, &LoggingProgressCallback::new(10)).await?;
//! ```

pub mod error;
pub mod ingest;
pub mod pipeline;

#[cfg(test)]
mod test_support;

pub use error::{IndexingError, PipelineError};
pub use ingest::{
    IngestConfig, IngestPhase, IngestStats, Ingestor, LoggingProgressCallback,
    NoOpProgressCallback, ProgressCallback,
};
pub use pipeline::{BatchEmbeddingPipeline, BatchOutcome, PipelineOutput};
