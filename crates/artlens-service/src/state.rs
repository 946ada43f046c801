//! Shared handler state.

use std::sync::Arc;

use artlens_catalog::ImageSource;
use artlens_types::{SearchSettings, ServerSettings};

use crate::search::SearchService;

/// Application state shared by all handlers
pub struct AppState {
    pub search: Arc<SearchService>,
    /// Source for `GET /image/{id}`
    pub images: Arc<dyn ImageSource>,
    pub server_settings: ServerSettings,
    pub search_settings: SearchSettings,
}

impl AppState {
    pub fn new(
        search: Arc<SearchService>,
        images: Arc<dyn ImageSource>,
        server_settings: ServerSettings,
        search_settings: SearchSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            search,
            images,
            server_settings,
            search_settings,
        })
    }

    /// Public URL clients use to load an artwork image.
    pub fn image_url(&self, object_id: u64) -> String {
        format!(
            "{}/image/{}",
            self.server_settings.public_base_url.trim_end_matches('/'),
            object_id
        )
    }
}
