//! Durable, ordered, prefix-scannable storage for DEK metadata records,
//! backed by `sled`. Each record lives under the literal key
//! `dek:<dek_id>`; `scan_prefix(b"dek:")` is the ordered-iteration
//! primitive the registry's warm-start and listing rely on.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEK_PREFIX: &[u8] = b"dek:";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage engine error")]
    Engine(#[from] sled::Error),

    #[error("record not found for key {0}")]
    NotFound(String),

    #[error("stored record is corrupt")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMetaRecord {
    pub wrapped: String,
    pub scope_id: String,
}

/// Wraps a `sled::Db`. Cheap to clone (sled handles are `Arc`-backed
/// internally); `close` is idempotent via `sled`'s own drop semantics.
#[derive(Clone)]
pub struct KeyStore {
    db: sled::Db,
}

impl KeyStore {
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let db = sled::open(data_dir)?;
        Ok(Self { db })
    }

    fn key_for(dek_id: &str) -> Vec<u8> {
        let mut k = Vec::with_capacity(DEK_PREFIX.len() + dek_id.len());
        k.extend_from_slice(DEK_PREFIX);
        k.extend_from_slice(dek_id.as_bytes());
        k
    }

    /// Writes `record` under `dek:<dek_id>` and fsyncs before returning,
    /// so a successful return means the record is durable.
    pub fn put(&self, dek_id: &str, record: &KeyMetaRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)?;
        self.db.insert(Self::key_for(dek_id), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn get(&self, dek_id: &str) -> Result<KeyMetaRecord, StoreError> {
        let bytes = self
            .db
            .get(Self::key_for(dek_id))?
            .ok_or_else(|| StoreError::NotFound(dek_id.to_string()))?;
        let record = serde_json::from_slice(&bytes)?;
        Ok(record)
    }

    pub fn try_get(&self, dek_id: &str) -> Result<Option<KeyMetaRecord>, StoreError> {
        match self.db.get(Self::key_for(dek_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Visits every record in key-sorted order. `dek_id` is recovered by
    /// stripping the `dek:` prefix from the stored key.
    pub fn iterate<F>(&self, mut f: F) -> Result<(), StoreError>
    where
        F: FnMut(&str, &KeyMetaRecord) -> Result<(), StoreError>,
    {
        for entry in self.db.scan_prefix(DEK_PREFIX) {
            let (key, value) = entry?;
            let dek_id = String::from_utf8_lossy(&key[DEK_PREFIX.len()..]).into_owned();
            let record: KeyMetaRecord = serde_json::from_slice(&value)?;
            f(&dek_id, &record)?;
        }
        Ok(())
    }

    pub fn close(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn is_reachable(&self) -> bool {
        self.db.flush().is_ok()
    }
}
