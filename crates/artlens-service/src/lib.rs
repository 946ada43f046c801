//! Search service and HTTP API for artlens.
//!
//! Provides:
//! - [`SearchService`]: query-by-image over the artwork vector store
//! - `POST /search`: multipart image upload, ranked results
//! - `GET /image/{object_id}`: artwork image proxy
//! - `GET /health`: liveness and vector count

pub mod api;
pub mod search;
pub mod server;
pub mod state;

pub use api::{ApiError, SearchResponse, SearchResultItem, IMAGE_FIELD};
pub use search::{SearchError, SearchService};
pub use server::{create_app, run_server_with_shutdown};
pub use state::AppState;
