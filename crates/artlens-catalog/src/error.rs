//! Catalog error types.

use thiserror::Error;

/// Errors surfaced by catalog readers and fetcher construction.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// CSV parse or write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog file lacks a required column
    #[error("Missing column in catalog header: {0}")]
    MissingColumn(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Failure while fetching one image.
///
/// Never leaves the fetcher: every variant collapses to an absent image.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Metadata response was not the expected JSON
    #[error("Malformed metadata: {0}")]
    Malformed(String),

    /// Object has no primary image
    #[error("No primary image")]
    NoPrimaryImage,

    /// Image response had an empty body
    #[error("Empty image payload")]
    EmptyPayload,
}

impl FetchError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
