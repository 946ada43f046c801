//! Model weight caching.
//!
//! Downloads the ResNet-50 safetensors file from HuggingFace Hub once and
//! keeps a copy under the local cache directory.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::EmbeddingError;

/// Default weights repository on HuggingFace
pub const DEFAULT_MODEL_REPO: &str = "lmz/candle-resnet";

/// Default weights file inside the repository
pub const DEFAULT_WEIGHTS_FILE: &str = "resnet50.safetensors";

/// Model cache configuration
#[derive(Debug, Clone)]
pub struct ModelCache {
    /// Cache directory path
    pub cache_dir: PathBuf,
    /// Model repository ID
    pub repo_id: String,
    /// Weights file name within the repository
    pub weights_file: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("artlens")
            .join("models");

        Self {
            cache_dir,
            repo_id: DEFAULT_MODEL_REPO.to_string(),
            weights_file: DEFAULT_WEIGHTS_FILE.to_string(),
        }
    }
}

impl ModelCache {
    /// Create a new model cache with custom settings
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        repo_id: impl Into<String>,
        weights_file: impl Into<String>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
            weights_file: weights_file.into(),
        }
    }

    /// Get the model directory path
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.repo_id.replace('/', "_"))
    }

    /// Path where the weights file lives once cached
    pub fn weights_path(&self) -> PathBuf {
        self.model_dir().join(&self.weights_file)
    }

    /// Check if the weights are cached
    pub fn is_cached(&self) -> bool {
        self.weights_path().exists()
    }
}

/// Get or download the model weights, returning the local safetensors path.
pub fn get_or_download_weights(cache: &ModelCache) -> Result<PathBuf, EmbeddingError> {
    let weights = cache.weights_path();

    if cache.is_cached() {
        debug!(path = ?weights, "Using cached model");
        return Ok(weights);
    }

    info!(repo = %cache.repo_id, file = %cache.weights_file, "Downloading model weights...");
    download_weights(cache)?;
    Ok(weights)
}

fn download_weights(cache: &ModelCache) -> Result<(), EmbeddingError> {
    use hf_hub::api::sync::Api;

    let api = Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let repo = api.model(cache.repo_id.clone());

    std::fs::create_dir_all(cache.model_dir())?;

    let source_path = repo
        .get(&cache.weights_file)
        .map_err(|e| EmbeddingError::Download(format!("{}: {}", cache.weights_file, e)))?;

    let dest_path = cache.weights_path();
    std::fs::copy(&source_path, &dest_path)?;
    debug!(file = %cache.weights_file, "Downloaded to {:?}", dest_path);

    Ok(())
}
