//! HTTP server setup.
//!
//! Routes, CORS, upload limit and request tracing around the search API.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::{health_handler, image_handler, search_handler};
use crate::state::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Build the API router.
pub fn create_app(state: Arc<AppState>) -> Router {
    let max_upload = state.server_settings.max_upload_bytes;

    Router::new()
        .route("/search", post(search_handler))
        .route("/image/{object_id}", get(image_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload))
        .layer(cors_layer(&state.server_settings.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn run_server_with_shutdown<F>(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("HTTP server ready on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    info!("HTTP server shutdown complete");
    Ok(())
}
