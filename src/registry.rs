//! In-memory DEK registry: a map from DEK id to its wrapped form. Each
//! entry is locked independently so operations on distinct DEKIds proceed
//! fully in parallel; only the outer map lock (held briefly, never across
//! AEAD or store I/O) is shared.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::crypto::{self, CryptoError, RootWrapper};
use crate::secret::SecretBuffer;
use crate::store::{KeyMetaRecord, KeyStore, StoreError};

const MAX_ID_COLLISION_RETRIES: u32 = 3;
const DEK_ID_RANDOM_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("unknown DEK id {0}")]
    UnknownDek(String),

    #[error("exhausted DEK id generation retries")]
    IdExhausted,

    #[error("registry is closed")]
    Closed,
}

struct Entry {
    wrapped: SecretBuffer,
    scope_id: String,
}

type Slot = Arc<RwLock<Entry>>;

pub struct DekRegistry {
    entries: RwLock<HashMap<String, Slot>>,
    store: KeyStore,
    closed: RwLock<bool>,
}

impl DekRegistry {
    pub fn new(store: KeyStore) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store,
            closed: RwLock::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), RegistryError> {
        if *self.closed.read().expect("closed lock poisoned") {
            return Err(RegistryError::Closed);
        }
        Ok(())
    }

    /// Looks up the slot for `dek_id` under a brief shared lock on the
    /// outer map. Does not hold the outer lock beyond this call.
    fn slot(&self, dek_id: &str) -> Option<Slot> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(dek_id)
            .cloned()
    }

    /// Generates a fresh DEK for `scope_id`, wraps it under `root`,
    /// persists the wrapped form, and inserts it into the in-memory map.
    pub fn create_for_scope(
        &self,
        root: &RootWrapper,
        scope_id: &str,
    ) -> Result<(String, Vec<u8>), RegistryError> {
        self.ensure_open()?;

        let dek = crypto::generate_dek();
        let wrapped = root.wrap(dek.expose_secret())?;

        let dek_id = self.allocate_id(&wrapped, scope_id)?;
        Ok((dek_id, wrapped))
    }

    /// Picks a non-colliding id, writes its record to the store, then
    /// inserts it into the map. The outer map lock is only ever taken to
    /// check-and-insert; store I/O happens outside of it.
    fn allocate_id(&self, wrapped: &[u8], scope_id: &str) -> Result<String, RegistryError> {
        for _ in 0..MAX_ID_COLLISION_RETRIES {
            let candidate = generate_dek_id();

            if self
                .entries
                .read()
                .expect("registry lock poisoned")
                .contains_key(&candidate)
            {
                continue;
            }

            let record = KeyMetaRecord {
                wrapped: STANDARD.encode(wrapped),
                scope_id: scope_id.to_string(),
            };
            self.store.put(&candidate, &record)?;

            let slot = Arc::new(RwLock::new(Entry {
                wrapped: SecretBuffer::new(wrapped),
                scope_id: scope_id.to_string(),
            }));

            let mut entries = self.entries.write().expect("registry lock poisoned");
            if entries.contains_key(&candidate) {
                continue;
            }
            entries.insert(candidate.clone(), slot);
            return Ok(candidate);
        }
        Err(RegistryError::IdExhausted)
    }

    /// Loads a DEK from the persistent store into the in-memory map if it
    /// is not already resident. No-op if already loaded. The AEAD/store
    /// read happens before the outer map lock is taken for the insert.
    pub fn ensure_loaded(&self, dek_id: &str) -> Result<(), RegistryError> {
        self.ensure_open()?;

        if self.slot(dek_id).is_some() {
            return Ok(());
        }

        let record = match self.store.try_get(dek_id)? {
            Some(record) => record,
            None => return Err(RegistryError::UnknownDek(dek_id.to_string())),
        };
        let wrapped = STANDARD
            .decode(record.wrapped.as_bytes())
            .map_err(|_| RegistryError::UnknownDek(dek_id.to_string()))?;

        let slot = Arc::new(RwLock::new(Entry {
            wrapped: SecretBuffer::new(&wrapped),
            scope_id: record.scope_id,
        }));

        let mut entries = self.entries.write().expect("registry lock poisoned");
        entries.entry(dek_id.to_string()).or_insert(slot);
        Ok(())
    }

    pub fn get_wrapped(&self, dek_id: &str) -> Result<Vec<u8>, RegistryError> {
        self.ensure_open()?;
        self.ensure_loaded(dek_id)?;
        let slot = self
            .slot(dek_id)
            .ok_or_else(|| RegistryError::UnknownDek(dek_id.to_string()))?;
        let entry = slot.read().expect("entry lock poisoned");
        Ok(entry.wrapped.view().to_vec())
    }

    pub fn encrypt(
        &self,
        root: &RootWrapper,
        dek_id: &str,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, RegistryError> {
        self.ensure_open()?;
        self.ensure_loaded(dek_id)?;

        let slot = self
            .slot(dek_id)
            .ok_or_else(|| RegistryError::UnknownDek(dek_id.to_string()))?;
        let entry = slot.read().expect("entry lock poisoned");

        let dek = root.unwrap(entry.wrapped.view())?;
        let result = crypto::encrypt_with_dek(dek.expose_secret(), plaintext, aad)?;
        Ok(result)
    }

    pub fn decrypt(
        &self,
        root: &RootWrapper,
        dek_id: &str,
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, RegistryError> {
        self.ensure_open()?;
        self.ensure_loaded(dek_id)?;

        let slot = self
            .slot(dek_id)
            .ok_or_else(|| RegistryError::UnknownDek(dek_id.to_string()))?;
        let entry = slot.read().expect("entry lock poisoned");

        let dek = root.unwrap(entry.wrapped.view())?;
        let result = crypto::decrypt_with_dek(dek.expose_secret(), ciphertext, aad)?;
        Ok(result)
    }

    /// Re-wraps the DEK identified by `dek_id` under `new_root`. Takes
    /// only that DEK's own entry lock for the duration of the AEAD
    /// unwrap/wrap and the store write — concurrent encrypt/decrypt on
    /// every other DEKId proceeds unaffected, since the outer map lock is
    /// released as soon as this entry's `Arc` is cloned out of it.
    pub fn rewrap(
        &self,
        old_root: &RootWrapper,
        new_root: &RootWrapper,
        dek_id: &str,
    ) -> Result<Vec<u8>, RegistryError> {
        self.ensure_open()?;
        self.ensure_loaded(dek_id)?;

        let slot = self
            .slot(dek_id)
            .ok_or_else(|| RegistryError::UnknownDek(dek_id.to_string()))?;
        let mut entry = slot.write().expect("entry lock poisoned");

        let dek = old_root.unwrap(entry.wrapped.view())?;
        let new_wrapped = new_root.wrap(dek.expose_secret())?;

        let record = KeyMetaRecord {
            wrapped: STANDARD.encode(&new_wrapped),
            scope_id: entry.scope_id.clone(),
        };
        self.store.put(dek_id, &record)?;

        entry.wrapped.clear();
        entry.wrapped = SecretBuffer::new(&new_wrapped);

        Ok(new_wrapped)
    }

    pub fn close(&self) {
        let mut closed = self.closed.write().expect("closed lock poisoned");
        if *closed {
            return;
        }
        let mut entries = self.entries.write().expect("registry lock poisoned");
        for (_, slot) in entries.drain() {
            if let Ok(mut entry) = slot.write() {
                entry.wrapped.clear();
            }
        }
        *closed = true;
    }
}

fn generate_dek_id() -> String {
    let mut bytes = [0u8; DEK_ID_RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
