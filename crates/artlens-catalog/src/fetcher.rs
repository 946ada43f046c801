//! Remote image fetcher.
//!
//! Resolves a catalog object id to the raw bytes of its primary image via
//! the collection API. Every failure is logged and collapsed to an absent
//! image; nothing propagates past `fetch`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use artlens_types::CatalogSettings;

use crate::error::{CatalogError, FetchError};

/// Default number of fetches in flight within one batch
pub const DEFAULT_FETCH_CONCURRENCY: usize = 128;

/// Source of artwork images keyed by catalog object id.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetch one image. `None` means the image is absent for any reason.
    async fn fetch(&self, object_id: u64) -> Option<Bytes>;

    /// Upper bound on concurrent fetches in `fetch_batch`.
    fn concurrency(&self) -> usize {
        DEFAULT_FETCH_CONCURRENCY
    }

    /// Fetch many images concurrently.
    ///
    /// The result has the same length as `object_ids` and the i-th entry
    /// belongs to the i-th id, regardless of completion order.
    async fn fetch_batch(&self, object_ids: &[u64]) -> Vec<Option<Bytes>> {
        debug!(count = object_ids.len(), "Fetching image batch");
        stream::iter(object_ids.iter().copied())
            .map(|id| self.fetch(id))
            .buffered(self.concurrency().max(1))
            .collect()
            .await
    }
}

/// Configuration for the collection API client.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// API base URL, e.g. `https://collectionapi.metmuseum.org/public/collection/v1`
    pub api_base_url: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// First backoff interval
    pub retry_base_delay: Duration,

    /// Concurrent fetches per batch
    pub concurrency: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self::from(&CatalogSettings::default())
    }
}

impl From<&CatalogSettings> for FetcherConfig {
    fn from(settings: &CatalogSettings) -> Self {
        Self {
            api_base_url: settings.api_base_url.clone(),
            timeout: Duration::from_secs(settings.request_timeout_secs),
            max_retries: settings.max_retries,
            retry_base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            concurrency: settings.fetch_concurrency,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObjectMetadata {
    #[serde(rename = "primaryImage", default)]
    primary_image: Option<String>,
}

/// Client for the Metropolitan Museum collection API.
///
/// Owns one HTTP connection pool for its whole lifetime. The pool is
/// released when the client is dropped.
pub struct MetCatalogClient {
    client: Client,
    config: FetcherConfig,
}

impl MetCatalogClient {
    /// Create a new client.
    pub fn new(config: FetcherConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CatalogError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    fn object_url(&self, object_id: u64) -> String {
        format!(
            "{}/objects/{}",
            self.config.api_base_url.trim_end_matches('/'),
            object_id
        )
    }

    /// Fetch one image, surfacing the reason on failure.
    pub async fn try_fetch(&self, object_id: u64) -> Result<Bytes, FetchError> {
        let image_url = self
            .with_retry(object_id, || self.primary_image_url(object_id))
            .await?;
        self.with_retry(object_id, || self.download(&image_url)).await
    }

    async fn primary_image_url(&self, object_id: u64) -> Result<String, FetchError> {
        let url = self.object_url(object_id);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let metadata: ObjectMetadata = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        match metadata.primary_image {
            Some(image_url) if !image_url.trim().is_empty() => Ok(image_url),
            _ => Err(FetchError::NoPrimaryImage),
        }
    }

    async fn download(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyPayload);
        }
        Ok(bytes)
    }

    /// Run `op`, retrying transient failures with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, object_id: u64, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.config.retry_base_delay,
            current_interval: self.config.retry_base_delay,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut retries = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retries < self.config.max_retries => {
                    retries += 1;
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or(self.config.retry_base_delay);
                    debug!(
                        object_id,
                        attempt = retries,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Transient fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ImageSource for MetCatalogClient {
    async fn fetch(&self, object_id: u64) -> Option<Bytes> {
        match self.try_fetch(object_id).await {
            Ok(bytes) => {
                debug!(object_id, size = bytes.len(), "Fetched image");
                Some(bytes)
            }
            Err(e) => {
                warn!(object_id, error = %e, "Could not fetch image");
                None
            }
        }
    }

    fn concurrency(&self) -> usize {
        self.config.concurrency
    }
}
