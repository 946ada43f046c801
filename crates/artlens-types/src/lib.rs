//! # artlens-types
//!
//! Shared domain types for the artlens image retrieval system.
//!
//! This crate defines the data structures passed between crates:
//! - Catalog records: one artwork row from the source catalog
//! - Artwork payloads: the metadata stored next to every vector
//! - Search hits: ranked results returned to callers
//! - Settings: layered configuration for the daemon
//!
//! ## Usage
//!
//! ```rust
//! use artlens_types::{ArtworkPayload, CatalogRecord};
//!
//! let record = CatalogRecord::new(436535).with_title("Wheat Field with Cypresses");
//! let payload = ArtworkPayload::from(&record);
//! assert_eq!(payload.title, "Wheat Field with Cypresses");
//! ```

pub mod artwork;
pub mod config;
pub mod error;

pub use artwork::{ArtworkPayload, CatalogRecord, SearchHit};
pub use config::{
    CatalogSettings, IngestSettings, ModelSettings, SearchSettings, ServerSettings, Settings,
};
pub use error::ArtlensError;
