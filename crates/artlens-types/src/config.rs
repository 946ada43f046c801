//! Configuration loading for artlens.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/artlens/config.toml.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ArtlensError;

/// Remote catalog (collection API) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Base URL of the collection API, without a trailing slash
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries for transient failures (429, 5xx, connection errors)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay between retries
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Maximum concurrent fetches within one sub-batch
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

fn default_api_base_url() -> String {
    "https://collectionapi.metmuseum.org/public/collection/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_fetch_concurrency() -> usize {
    128
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

/// Ingestion batching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Rows read from the catalog file at a time
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Rows fetched and embedded together
    #[serde(default = "default_sub_batch_size")]
    pub sub_batch_size: usize,

    /// Only rows whose classification contains this value are ingested.
    /// An empty string disables the filter.
    #[serde(default = "default_classification")]
    pub classification: String,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_sub_batch_size() -> usize {
    128
}

fn default_classification() -> String {
    "Paintings".to_string()
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            sub_batch_size: default_sub_batch_size(),
            classification: default_classification(),
        }
    }
}

/// Embedding model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Hugging Face repository holding the weights
    #[serde(default = "default_model_repo")]
    pub repo_id: String,

    /// Weights file inside the repository
    #[serde(default = "default_weights_file")]
    pub weights_file: String,

    /// Local cache directory (defaults to the user cache dir)
    #[serde(default)]
    pub cache_dir: Option<String>,
}

fn default_model_repo() -> String {
    "lmz/candle-resnet".to_string()
}

fn default_weights_file() -> String {
    "resnet50.safetensors".to_string()
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            repo_id: default_model_repo(),
            weights_file: default_weights_file(),
            cache_dir: None,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Base used to build `image_url` in search responses
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_public_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: default_public_base_url(),
            cors_origins: default_cors_origins(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Query settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Results returned when the caller does not ask for a count
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Upper bound on requested results
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    100
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the HNSW index file
    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// RocksDB directory holding vector payloads
    #[serde(default = "default_payload_db_path")]
    pub payload_db_path: String,

    /// Embedding dimension of the collection
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub catalog: CatalogSettings,

    #[serde(default)]
    pub ingest: IngestSettings,

    #[serde(default)]
    pub model: ModelSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub search: SearchSettings,
}

fn data_dir(name: &str) -> String {
    ProjectDirs::from("", "", "artlens")
        .map(|p| p.data_local_dir().join(name))
        .unwrap_or_else(|| PathBuf::from(".").join(name))
        .to_string_lossy()
        .to_string()
}

fn default_index_path() -> String {
    data_dir("vector-index")
}

fn default_payload_db_path() -> String {
    data_dir("payload-db")
}

fn default_dimension() -> usize {
    2048
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            payload_db_path: default_payload_db_path(),
            dimension: default_dimension(),
            log_level: default_log_level(),
            catalog: CatalogSettings::default(),
            ingest: IngestSettings::default(),
            model: ModelSettings::default(),
            server: ServerSettings::default(),
            search: SearchSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/artlens/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (ARTLENS_*, nested keys joined by `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ArtlensError> {
        let config_dir = ProjectDirs::from("", "", "artlens")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("index_path", default_index_path())
            .map_err(|e| ArtlensError::Config(e.to_string()))?
            .set_default("payload_db_path", default_payload_db_path())
            .map_err(|e| ArtlensError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| ArtlensError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: ARTLENS_LOG_LEVEL, ARTLENS_INGEST__SUB_BATCH_SIZE, ...
        builder = builder.add_source(
            Environment::with_prefix("ARTLENS")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| ArtlensError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| ArtlensError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ArtlensError> {
        if self.dimension == 0 {
            return Err(ArtlensError::Config("dimension must be > 0".to_string()));
        }
        if self.ingest.chunk_size == 0 || self.ingest.sub_batch_size == 0 {
            return Err(ArtlensError::Config(
                "ingest.chunk_size and ingest.sub_batch_size must be > 0".to_string(),
            ));
        }
        if self.catalog.fetch_concurrency == 0 {
            return Err(ArtlensError::Config(
                "catalog.fetch_concurrency must be > 0".to_string(),
            ));
        }
        if self.search.default_top_k == 0 || self.search.default_top_k > self.search.max_top_k {
            return Err(ArtlensError::Config(format!(
                "search.default_top_k must be within 1..={}, got {}",
                self.search.max_top_k, self.search.default_top_k
            )));
        }
        Ok(())
    }

    /// Socket address for the HTTP server
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn expanded_index_path(&self) -> PathBuf {
        expand_home(&self.index_path)
    }

    pub fn expanded_payload_db_path(&self) -> PathBuf {
        expand_home(&self.payload_db_path)
    }
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
