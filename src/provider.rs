//! The public contract every transport depends on: create, encrypt,
//! decrypt, rewrap, inspect, and close, composed from the crypto,
//! registry, and store layers. This is the only module external
//! collaborators (the HTTP layer, the CLI, tests) should reach into.

use std::path::Path;
use std::sync::RwLock;

use thiserror::Error;

use crate::crypto::{CryptoError, RootWrapper};
use crate::registry::{DekRegistry, RegistryError};
use crate::store::{KeyStore, StoreError};

const MAX_SCOPE_ID_LEN: usize = 256;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    WeakKey(#[from] CryptoError),

    #[error("unknown DEK id {0}")]
    UnknownDek(String),

    #[error("malformed ciphertext")]
    Malformed,

    #[error("authentication failed")]
    AuthFailure,

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("provider is closed")]
    Closed,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RegistryError> for ProviderError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Crypto(CryptoError::AuthFailure) => ProviderError::AuthFailure,
            RegistryError::Crypto(CryptoError::Malformed) => ProviderError::Malformed,
            RegistryError::Crypto(other) => ProviderError::WeakKey(other),
            RegistryError::Storage(err) => ProviderError::Storage(err),
            RegistryError::UnknownDek(id) => ProviderError::UnknownDek(id),
            RegistryError::IdExhausted => ProviderError::Internal("DEK id space exhausted".into()),
            RegistryError::Closed => ProviderError::Closed,
        }
    }
}

pub struct CreatedDek {
    pub dek_id: String,
    pub wrapped: Vec<u8>,
    pub root_key_id: String,
}

pub struct EncryptedBlob {
    pub ciphertext: Vec<u8>,
    pub root_key_id: String,
}

pub struct RewrappedDek {
    pub wrapped: Vec<u8>,
    pub root_key_id: String,
}

/// Composition of the crypto, registry, and store layers behind the
/// stable operation set. `root` may be swapped administratively (outside
/// the scope of `rewrap_dek`, which only changes one DEK's wrapping).
pub struct Provider {
    root: RwLock<RootWrapper>,
    registry: DekRegistry,
    store: KeyStore,
    closed: RwLock<bool>,
}

impl Provider {
    pub fn open(data_dir: &Path, root_key: &[u8], root_key_id: impl Into<String>) -> Result<Self, ProviderError> {
        let store = KeyStore::open(data_dir)?;
        let root = RootWrapper::new(root_key, root_key_id)?;
        let registry = DekRegistry::new(store.clone());
        Ok(Self {
            root: RwLock::new(root),
            registry,
            store,
            closed: RwLock::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), ProviderError> {
        if *self.closed.read().expect("closed lock poisoned") {
            return Err(ProviderError::Closed);
        }
        Ok(())
    }

    pub fn create_dek_for_scope(&self, scope_id: &str) -> Result<CreatedDek, ProviderError> {
        self.ensure_open()?;
        validate_scope_id(scope_id)?;

        let root = self.root.read().expect("root lock poisoned");
        let (dek_id, wrapped) = self.registry.create_for_scope(&root, scope_id)?;
        Ok(CreatedDek {
            dek_id,
            wrapped,
            root_key_id: root.key_id().to_string(),
        })
    }

    pub fn encrypt_with_dek(
        &self,
        dek_id: &str,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<EncryptedBlob, ProviderError> {
        self.ensure_open()?;
        let root = self.root.read().expect("root lock poisoned");
        let ciphertext = self.registry.encrypt(&root, dek_id, plaintext, aad)?;
        Ok(EncryptedBlob {
            ciphertext,
            root_key_id: root.key_id().to_string(),
        })
    }

    pub fn decrypt_with_dek(
        &self,
        dek_id: &str,
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, ProviderError> {
        self.ensure_open()?;
        if ciphertext.len() < crate::wire::NONCE_LEN + crate::wire::TAG_LEN {
            return Err(ProviderError::Malformed);
        }
        let root = self.root.read().expect("root lock poisoned");
        let plaintext = self.registry.decrypt(&root, dek_id, ciphertext, aad)?;
        Ok(plaintext)
    }

    /// Rewraps one DEK under `new_root_key_hex`. Does not change the
    /// provider's own default root; subsequent `create`/`encrypt` calls
    /// keep using the root this provider was opened with until an
    /// administrative rotation replaces it.
    pub fn rewrap_dek(
        &self,
        dek_id: &str,
        new_root_key_hex: &str,
    ) -> Result<RewrappedDek, ProviderError> {
        self.ensure_open()?;
        let new_root_key = decode_hex(new_root_key_hex)
            .map_err(|_| ProviderError::InvalidInput("new_kek_hex is not valid hex".into()))?;

        let new_root = RootWrapper::new(&new_root_key, "pending-rotation")?;
        let old_root = self.root.read().expect("root lock poisoned");
        let wrapped = self.registry.rewrap(&old_root, &new_root, dek_id)?;

        Ok(RewrappedDek {
            wrapped,
            root_key_id: new_root.key_id().to_string(),
        })
    }

    pub fn get_wrapped(&self, dek_id: &str) -> Result<Vec<u8>, ProviderError> {
        self.ensure_open()?;
        Ok(self.registry.get_wrapped(dek_id)?)
    }

    pub fn enabled(&self) -> bool {
        !*self.closed.read().expect("closed lock poisoned")
    }

    pub fn health(&self) -> bool {
        self.enabled() && self.store.is_reachable()
    }

    pub fn close(&self) {
        let mut closed = self.closed.write().expect("closed lock poisoned");
        if *closed {
            return;
        }
        self.registry.close();
        let _ = self.store.close();
        *closed = true;
    }
}

fn validate_scope_id(scope_id: &str) -> Result<(), ProviderError> {
    if scope_id.is_empty() || scope_id.len() > MAX_SCOPE_ID_LEN {
        return Err(ProviderError::InvalidInput(
            "scope_id must be 1-256 characters".into(),
        ));
    }
    let valid = scope_id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'/'));
    if !valid {
        return Err(ProviderError::InvalidInput(
            "scope_id may only contain [A-Za-z0-9_-/]".into(),
        ));
    }
    Ok(())
}

fn decode_hex(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}
