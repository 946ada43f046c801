//! Catalog ingestion.
//!
//! Streams the catalog in chunks, runs every sub-batch through the embedding
//! pipeline and upserts the results. A failing sub-batch is logged and
//! counted; the run moves on to the next one.

use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info};

use artlens_catalog::CatalogReader;
use artlens_types::IngestSettings;
use artlens_vector::VectorStore;

use crate::error::IndexingError;
use crate::pipeline::{BatchEmbeddingPipeline, BatchOutcome};

/// Ingestion run configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Catalog rows read per chunk
    pub chunk_size: usize,
    /// Rows per pipeline call
    pub sub_batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from(&IngestSettings::default())
    }
}

impl From<&IngestSettings> for IngestConfig {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            sub_batch_size: settings.sub_batch_size,
        }
    }
}

impl IngestConfig {
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_sub_batch_size(mut self, size: usize) -> Self {
        self.sub_batch_size = size;
        self
    }

    fn validate(&self) -> Result<(), IndexingError> {
        if self.chunk_size == 0 {
            return Err(IndexingError::InvalidConfig(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.sub_batch_size == 0 {
            return Err(IndexingError::InvalidConfig(
                "sub_batch_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where an ingestion run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPhase {
    /// Reading the next chunk from the catalog
    Streaming,
    /// Slicing a chunk into sub-batches
    SubBatching,
    /// Fetching and embedding one sub-batch
    Embedding,
    /// Writing one sub-batch to the store
    Upserting,
    /// Catalog exhausted and store flushed
    Done,
}

/// Running totals for an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Catalog rows accepted by the reader
    pub rows_read: usize,
    /// Rows rejected as malformed
    pub rows_invalid: usize,
    /// Rows excluded by the classification filter
    pub rows_filtered: usize,
    pub chunks: usize,
    /// Sub-batches attempted
    pub batches: usize,
    /// Sub-batches dropped after a pipeline or upsert failure
    pub batches_failed: usize,
    pub images_missing: usize,
    pub images_undecodable: usize,
    pub records_upserted: usize,
    /// Wall-clock duration of the run
    pub elapsed_ms: u64,
}

impl IngestStats {
    fn record_batch(&mut self, outcome: &BatchOutcome) {
        self.images_missing += outcome.missing;
        self.images_undecodable += outcome.undecodable;
    }
}

/// Trait for receiving ingestion progress updates.
pub trait ProgressCallback: Send + Sync {
    /// Called after each sub-batch is processed.
    fn on_progress(&self, stats: &IngestStats);
}

/// A no-op progress callback for when progress reporting isn't needed.
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn on_progress(&self, _stats: &IngestStats) {}
}

/// A callback that logs progress at info level every `every` sub-batches.
pub struct LoggingProgressCallback {
    every: usize,
}

impl LoggingProgressCallback {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl ProgressCallback for LoggingProgressCallback {
    fn on_progress(&self, stats: &IngestStats) {
        if stats.batches % self.every == 0 {
            info!(
                rows = stats.rows_read,
                batches = stats.batches,
                failed = stats.batches_failed,
                missing = stats.images_missing,
                upserted = stats.records_upserted,
                "Ingest progress"
            );
        }
    }
}

/// Drives catalog chunks through the pipeline into the vector store.
pub struct Ingestor {
    pipeline: BatchEmbeddingPipeline,
    store: Arc<dyn VectorStore>,
    config: IngestConfig,
    phase: IngestPhase,
}

impl Ingestor {
    pub fn new(
        pipeline: BatchEmbeddingPipeline,
        store: Arc<dyn VectorStore>,
        config: IngestConfig,
    ) -> Self {
        Self {
            pipeline,
            store,
            config,
            phase: IngestPhase::Streaming,
        }
    }

    pub fn phase(&self) -> IngestPhase {
        self.phase
    }

    fn enter(&mut self, phase: IngestPhase) {
        debug!(from = ?self.phase, to = ?phase, "Ingest phase");
        self.phase = phase;
    }

    /// Ingest every record the reader yields.
    ///
    /// Per-batch failures are isolated. Catalog read errors and a failed
    /// final flush abort the run.
    pub async fn run<R: Read, P: ProgressCallback>(
        &mut self,
        reader: &mut CatalogReader<R>,
        progress: &P,
    ) -> Result<IngestStats, IndexingError> {
        self.config.validate()?;
        let started = Instant::now();
        let mut stats = IngestStats::default();

        info!(
            chunk_size = self.config.chunk_size,
            sub_batch_size = self.config.sub_batch_size,
            "Starting ingestion"
        );

        loop {
            self.enter(IngestPhase::Streaming);
            let chunk = reader.next_chunk(self.config.chunk_size)?;
            if chunk.is_empty() {
                break;
            }
            stats.chunks += 1;
            stats.rows_read += chunk.len();
            debug!(chunk = stats.chunks, rows = chunk.len(), "Processing chunk");

            for batch in chunk.chunks(self.config.sub_batch_size) {
                self.enter(IngestPhase::SubBatching);
                stats.batches += 1;

                self.enter(IngestPhase::Embedding);
                let output = match self.pipeline.process(batch).await {
                    Ok(output) => output,
                    Err(e) => {
                        error!(batch = stats.batches, error = %e, "Batch failed, skipping");
                        stats.batches_failed += 1;
                        progress.on_progress(&stats);
                        continue;
                    }
                };
                stats.record_batch(&output.outcome);

                if !output.records.is_empty() {
                    self.enter(IngestPhase::Upserting);
                    let count = output.records.len();
                    match self.store.upsert(output.records).await {
                        Ok(written) => stats.records_upserted += written,
                        Err(e) => {
                            error!(batch = stats.batches, records = count, error = %e, "Upsert failed, skipping batch");
                            stats.batches_failed += 1;
                        }
                    }
                }

                progress.on_progress(&stats);
            }

            if let Err(e) = self.store.flush().await {
                error!(chunk = stats.chunks, error = %e, "Failed to flush store after chunk");
            }
        }

        self.store.flush().await?;

        let reader_stats = reader.stats();
        stats.rows_invalid = reader_stats.invalid;
        stats.rows_filtered = reader_stats.filtered;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        self.enter(IngestPhase::Done);

        info!(
            rows = stats.rows_read,
            batches = stats.batches,
            failed = stats.batches_failed,
            missing = stats.images_missing,
            undecodable = stats.images_undecodable,
            upserted = stats.records_upserted,
            elapsed_ms = stats.elapsed_ms,
            "Completed ingestion"
        );

        Ok(stats)
    }
}
