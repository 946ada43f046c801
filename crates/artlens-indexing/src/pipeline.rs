//! Batch embedding pipeline.
//!
//! Turns one sub-batch of catalog records into index records: fetch all
//! images concurrently, drop the absent ones, embed the rest in a single
//! model call and pair each vector with its record's metadata.

use std::sync::Arc;

use tracing::{debug, info, warn};

use artlens_catalog::ImageSource;
use artlens_embeddings::ImageEmbedder;
use artlens_types::{ArtworkPayload, CatalogRecord};
use artlens_vector::IndexRecord;

use crate::error::PipelineError;

/// Per-sub-batch counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Records handed to the pipeline
    pub requested: usize,
    /// Images fetched successfully
    pub fetched: usize,
    /// Records with no image
    pub missing: usize,
    /// Fetched images the model could not decode
    pub undecodable: usize,
    /// Index records produced
    pub embedded: usize,
    /// Ids of the records with no image, in input order
    pub missing_ids: Vec<u64>,
    /// Ids of the records whose image failed to decode, in input order
    pub undecodable_ids: Vec<u64>,
}

/// Output of one pipeline run.
#[derive(Debug, Default)]
pub struct PipelineOutput {
    pub records: Vec<IndexRecord>,
    pub outcome: BatchOutcome,
}

/// Fetch-then-embed pipeline over shared fetcher and model instances.
pub struct BatchEmbeddingPipeline {
    source: Arc<dyn ImageSource>,
    embedder: Arc<dyn ImageEmbedder>,
}

impl BatchEmbeddingPipeline {
    pub fn new(source: Arc<dyn ImageSource>, embedder: Arc<dyn ImageEmbedder>) -> Self {
        Self { source, embedder }
    }

    /// Process one sub-batch.
    ///
    /// Absent and undecodable images only drop their own record. A model
    /// failure or a vector count mismatch fails the whole sub-batch.
    pub async fn process(&self, records: &[CatalogRecord]) -> Result<PipelineOutput, PipelineError> {
        let mut outcome = BatchOutcome {
            requested: records.len(),
            ..Default::default()
        };
        if records.is_empty() {
            return Ok(PipelineOutput::default());
        }

        let ids: Vec<u64> = records.iter().map(|r| r.object_id).collect();
        let fetched = self.source.fetch_batch(&ids).await;
        if fetched.len() != ids.len() {
            return Err(PipelineError::FetchCountMismatch {
                requested: ids.len(),
                returned: fetched.len(),
            });
        }

        let mut survivors: Vec<&CatalogRecord> = Vec::with_capacity(records.len());
        let mut payloads = Vec::with_capacity(records.len());
        for (record, bytes) in records.iter().zip(fetched) {
            match bytes {
                Some(bytes) => {
                    survivors.push(record);
                    payloads.push(bytes);
                }
                None => {
                    warn!(object_id = record.object_id, "No image found, skipping record");
                    outcome.missing += 1;
                    outcome.missing_ids.push(record.object_id);
                }
            }
        }
        outcome.fetched = survivors.len();

        if survivors.is_empty() {
            info!(requested = outcome.requested, "No images in batch, skipping model");
            return Ok(PipelineOutput {
                records: vec![],
                outcome,
            });
        }

        debug!(images = payloads.len(), "Embedding batch");
        let embedder = self.embedder.clone();
        let vectors = tokio::task::spawn_blocking(move || {
            let slices: Vec<&[u8]> = payloads.iter().map(|b| &b[..]).collect();
            embedder.embed_bytes(&slices)
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;

        if vectors.len() != survivors.len() {
            return Err(PipelineError::VectorCountMismatch {
                images: survivors.len(),
                vectors: vectors.len(),
            });
        }

        let mut out = Vec::with_capacity(survivors.len());
        for (record, vector) in survivors.into_iter().zip(vectors) {
            match vector {
                Some(vector) => out.push(IndexRecord::new(
                    record.object_id,
                    vector,
                    ArtworkPayload::from(record),
                )),
                None => {
                    warn!(object_id = record.object_id, "Image could not be decoded, skipping record");
                    outcome.undecodable += 1;
                    outcome.undecodable_ids.push(record.object_id);
                }
            }
        }
        outcome.embedded = out.len();

        info!(
            requested = outcome.requested,
            missing = outcome.missing,
            undecodable = outcome.undecodable,
            embedded = outcome.embedded,
            "Batch embedded"
        );

        Ok(PipelineOutput {
            records: out,
            outcome,
        })
    }
}
