//! Artwork records, payloads and search hits.

use serde::{Deserialize, Serialize};

/// One artwork row from the source catalog.
///
/// Text fields are never absent: a missing value in the source becomes an
/// empty string when the record is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Catalog object id, also used as the vector id
    pub object_id: u64,
    pub title: String,
    pub artist: String,
    pub date: String,
    /// Link to the artwork page in the catalog
    pub source_url: String,
}

impl CatalogRecord {
    /// Create a record with empty metadata.
    pub fn new(object_id: u64) -> Self {
        Self {
            object_id,
            title: String::new(),
            artist: String::new(),
            date: String::new(),
            source_url: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }
}

/// Metadata stored alongside each vector in the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtworkPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub met_url: String,
}

impl From<&CatalogRecord> for ArtworkPayload {
    fn from(record: &CatalogRecord) -> Self {
        Self {
            title: record.title.clone(),
            artist: record.artist.clone(),
            date: record.date.clone(),
            met_url: record.source_url.clone(),
        }
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: u64,
    /// Cosine similarity, higher is closer
    pub score: f32,
    pub title: String,
    pub artist: String,
    pub date: String,
    pub met_url: String,
}

impl SearchHit {
    /// Build a hit from an id, a score and an optional payload.
    ///
    /// A missing payload yields empty metadata fields.
    pub fn new(id: u64, score: f32, payload: Option<ArtworkPayload>) -> Self {
        let payload = payload.unwrap_or_default();
        Self {
            id,
            score,
            title: payload.title,
            artist: payload.artist,
            date: payload.date,
            met_url: payload.met_url,
        }
    }
}
