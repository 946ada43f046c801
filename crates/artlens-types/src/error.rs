//! Error types shared across artlens crates.

use thiserror::Error;

/// Unified error type for configuration and boundary validation.
#[derive(Debug, Error)]
pub enum ArtlensError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
