//! Query-by-image search.
//!
//! Embeds one uploaded image with the same model and preprocessing used at
//! ingestion, then ranks stored artworks by cosine similarity.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info};

use artlens_embeddings::{EmbeddingError, ImageEmbedder};
use artlens_types::SearchHit;
use artlens_vector::{VectorError, VectorStore};

/// Errors returned by [`SearchService::search`].
#[derive(Debug, Error)]
pub enum SearchError {
    /// Caller supplied an unusable request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The query bytes are not a decodable image
    #[error("Query image could not be decoded")]
    UndecodableImage,

    /// Model inference failed
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector store query failed
    #[error("Vector store error: {0}")]
    Store(#[from] VectorError),

    /// Broken internal invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Similarity search over the artwork store.
pub struct SearchService {
    embedder: Arc<dyn ImageEmbedder>,
    store: Arc<dyn VectorStore>,
}

impl SearchService {
    pub fn new(embedder: Arc<dyn ImageEmbedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Find up to `top_k` artworks most similar to the query image.
    ///
    /// An empty store yields `Ok(vec![])`. Undecodable query bytes are an
    /// error, not an empty result.
    pub async fn search(&self, query: Bytes, top_k: usize) -> Result<Vec<SearchHit>, SearchError> {
        if top_k == 0 {
            return Err(SearchError::InvalidInput(
                "top_k must be greater than 0".to_string(),
            ));
        }

        debug!(size = query.len(), top_k, "Embedding query image");
        let embedder = self.embedder.clone();
        let mut batch = tokio::task::spawn_blocking(move || embedder.embed_bytes(&[&query[..]]))
            .await
            .map_err(|e| SearchError::Internal(format!("Task error: {}", e)))??;

        if batch.len() != 1 {
            return Err(SearchError::Internal(format!(
                "expected one query vector, got {}",
                batch.len()
            )));
        }
        let vector = batch.pop().flatten().ok_or(SearchError::UndecodableImage)?;

        let points = self.store.search(&vector, top_k).await?;
        let hits: Vec<SearchHit> = points
            .into_iter()
            .map(|p| SearchHit::new(p.id, p.score, p.payload))
            .collect();

        info!(top_k, results = hits.len(), "Search complete");
        Ok(hits)
    }
}
