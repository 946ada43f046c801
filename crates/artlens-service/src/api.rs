//! HTTP handlers.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};

use artlens_types::SearchHit;

use crate::search::SearchError;
use crate::state::AppState;

/// Multipart field carrying the query image
pub const IMAGE_FIELD: &str = "image";

/// API error rendered as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidInput(m) => ApiError::BadRequest(m),
            other => {
                error!(error = %other, "Search failed");
                ApiError::Internal("An error occurred while processing your request".to_string())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub top_k: Option<usize>,
}

/// One search result as returned to clients.
#[derive(Debug, Serialize)]
pub struct SearchResultItem {
    #[serde(flatten)]
    pub hit: SearchHit,
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
}

/// `POST /search`: multipart upload with an `image` field.
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
    mut multipart: Multipart,
) -> Result<Json<SearchResponse>, ApiError> {
    let top_k = params
        .top_k
        .unwrap_or(state.search_settings.default_top_k)
        .min(state.search_settings.max_top_k);

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            image = Some(bytes);
        }
    }
    let image = image.ok_or_else(|| ApiError::BadRequest(format!("missing '{IMAGE_FIELD}' field")))?;

    debug!(size = image.len(), top_k, "Search request");
    let hits = state.search.search(image, top_k).await?;

    let results = hits
        .into_iter()
        .map(|hit| SearchResultItem {
            image_url: state.image_url(hit.id),
            hit,
        })
        .collect();

    Ok(Json(SearchResponse { results }))
}

/// `GET /image/{object_id}`: proxy the artwork's primary image.
pub async fn image_handler(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<u64>,
) -> Result<Response, ApiError> {
    match state.images.fetch(object_id).await {
        Some(bytes) => Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response()),
        None => {
            warn!(object_id, "Image not found");
            Err(ApiError::NotFound("Image not found".to_string()))
        }
    }
}

/// `GET /health`
pub async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.search.store().stats().await.map_err(|e| {
        error!(error = %e, "Health check failed");
        ApiError::Internal("vector store unavailable".to_string())
    })?;
    Ok(Json(json!({ "status": "ok", "vectors": stats.vector_count })))
}
