//! # artlens-catalog
//!
//! Access to the museum collection for artlens.
//!
//! - [`CatalogReader`] streams the collection CSV export in chunks.
//! - [`MetCatalogClient`] resolves object ids to primary image bytes via the
//!   collection API, behind the [`ImageSource`] trait.
//! - [`filter_catalog`] narrows a full export down to one classification.

pub mod error;
pub mod fetcher;
pub mod reader;

pub use error::{CatalogError, FetchError};
pub use fetcher::{FetcherConfig, ImageSource, MetCatalogClient, DEFAULT_FETCH_CONCURRENCY};
pub use reader::{filter_catalog, CatalogReader, ReaderStats};
