//! Artwork payload storage.
//!
//! Maps object ids to the metadata stored alongside each vector. Stored in
//! RocksDB for persistence and atomic batch updates.

use std::path::Path;

use artlens_types::ArtworkPayload;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::VectorError;

/// Column family name for artwork payloads
pub const CF_ARTWORK_PAYLOAD: &str = "artwork_payload";

/// Payload entry as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub payload: ArtworkPayload,
    /// When the entry was last written (ms since epoch)
    pub indexed_at: i64,
}

impl StoredEntry {
    pub fn new(payload: ArtworkPayload) -> Self {
        Self {
            payload,
            indexed_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Payload storage using RocksDB.
pub struct PayloadStore {
    db: DB,
}

impl PayloadStore {
    /// Open or create payload storage.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VectorError> {
        let path = path.as_ref();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_ARTWORK_PAYLOAD, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf])?;

        info!(path = ?path, "Opened payload storage");
        Ok(Self { db })
    }

    fn cf(&self) -> Result<&ColumnFamily, VectorError> {
        self.db
            .cf_handle(CF_ARTWORK_PAYLOAD)
            .ok_or(VectorError::MissingColumnFamily(CF_ARTWORK_PAYLOAD))
    }

    /// Store one entry, replacing any previous entry for the id.
    pub fn put(&self, id: u64, entry: &StoredEntry) -> Result<(), VectorError> {
        let value = serde_json::to_vec(entry)?;
        self.db.put_cf(self.cf()?, id.to_be_bytes(), value)?;
        debug!(id, "Stored payload");
        Ok(())
    }

    /// Store many entries in one atomic write.
    pub fn put_batch(&self, entries: &[(u64, StoredEntry)]) -> Result<(), VectorError> {
        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        for (id, entry) in entries {
            batch.put_cf(cf, id.to_be_bytes(), serde_json::to_vec(entry)?);
        }
        self.db.write(batch)?;
        debug!(count = entries.len(), "Stored payload batch");
        Ok(())
    }

    /// Get an entry by object id.
    pub fn get(&self, id: u64) -> Result<Option<StoredEntry>, VectorError> {
        match self.db.get_cf(self.cf()?, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete an entry by object id.
    pub fn delete(&self, id: u64) -> Result<(), VectorError> {
        self.db.delete_cf(self.cf()?, id.to_be_bytes())?;
        Ok(())
    }

    /// Count total entries
    pub fn count(&self) -> Result<usize, VectorError> {
        let mut count = 0;
        for item in self.db.iterator_cf(self.cf()?, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Delete every entry.
    pub fn clear(&self) -> Result<(), VectorError> {
        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(cf, key);
        }
        self.db.write(batch)?;
        info!("Cleared payload storage");
        Ok(())
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> Result<(), VectorError> {
        self.db.flush_cf(self.cf()?)?;
        Ok(())
    }
}
