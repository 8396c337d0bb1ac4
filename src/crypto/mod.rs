//! AEAD primitives used throughout the service: AES-256-GCM with a fresh
//! random nonce per call, and a thin `RootWrapper` that binds a validated
//! root key to wrap/unwrap operations on DEK-sized payloads.
//!
//! Wrap and per-DEK encrypt share the same wire shape: `nonce || ciphertext
//! || tag` (see [`crate::wire`]). Callers never see a raw key that was not
//! already entropy-checked by [`crate::entropy::validate_root_key`].

use aes_gcm::aead::{Aead, AeadCore, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::rngs::OsRng as RandOsRng;
use secrecy::{ExposeSecret, SecretSlice};
use thiserror::Error;

use crate::entropy::{self, KeyValidationError};
use crate::wire::{self, NONCE_LEN, TAG_LEN};

pub const DEK_LEN: usize = 32;

pub type SecretBytes = SecretSlice<u8>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("root key failed validation: {0}")]
    WeakKey(#[from] KeyValidationError),

    #[error("authentication failed")]
    AuthFailure,

    #[error("ciphertext is too short to contain a nonce and tag")]
    Malformed,

    #[error("invalid key length for AES-256-GCM")]
    InvalidKeyLength,
}

/// Generates a fresh 32-byte DEK using the OS CSPRNG.
pub fn generate_dek() -> SecretBytes {
    use rand::RngCore;
    let mut bytes = vec![0u8; DEK_LEN];
    RandOsRng.fill_bytes(&mut bytes);
    SecretBytes::from(bytes)
}

/// An AES-256-GCM cipher bound to one root key. Immutable once
/// constructed; safe to share across threads for concurrent wrap/unwrap.
pub struct RootWrapper {
    cipher: Aes256Gcm,
    key_id: String,
}

impl RootWrapper {
    /// Validates `root_key` (exactly 32 bytes, passes entropy checks) and
    /// binds it to a label used only for diagnostics and wire responses.
    pub fn new(root_key: &[u8], key_id: impl Into<String>) -> Result<Self, CryptoError> {
        entropy::validate_root_key(root_key)?;
        let key = Key::<Aes256Gcm>::from_slice(root_key);
        let cipher = Aes256Gcm::new(key);
        Ok(Self {
            cipher,
            key_id: key_id.into(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Wraps `plaintext` (typically a raw DEK) and returns
    /// `nonce || ciphertext || tag`.
    pub fn wrap(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(RandOsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad: &[] })
            .map_err(|_| CryptoError::AuthFailure)?;
        Ok(wire::assemble(&nonce, &ciphertext))
    }

    /// Unwraps a blob produced by [`RootWrapper::wrap`].
    pub fn unwrap(&self, blob: &[u8]) -> Result<SecretBytes, CryptoError> {
        let (nonce, ciphertext) = wire::split(blob).ok_or(CryptoError::Malformed)?;
        let nonce = Nonce::from_slice(nonce);
        let plaintext = self
            .cipher
            .decrypt(nonce, Payload { msg: ciphertext, aad: &[] })
            .map_err(|_| CryptoError::AuthFailure)?;
        Ok(SecretBytes::from(plaintext))
    }
}

/// Encrypts `plaintext` under a raw DEK with optional additional
/// authenticated data. Returns `nonce || ciphertext || tag`.
pub fn encrypt_with_dek(
    dek: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(dek).map_err(|_| CryptoError::InvalidKeyLength)?;
    let nonce = Aes256Gcm::generate_nonce(RandOsRng);
    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::AuthFailure)?;
    Ok(wire::assemble(&nonce, &ciphertext))
}

/// Decrypts a blob produced by [`encrypt_with_dek`] under the same DEK
/// and AAD.
pub fn decrypt_with_dek(
    dek: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Malformed);
    }
    let cipher = Aes256Gcm::new_from_slice(dek).map_err(|_| CryptoError::InvalidKeyLength)?;
    let (nonce, ct) = wire::split(ciphertext).ok_or(CryptoError::Malformed)?;
    let nonce = Nonce::from_slice(nonce);
    cipher
        .decrypt(nonce, Payload { msg: ct, aad })
        .map_err(|_| CryptoError::AuthFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_root_key() -> Vec<u8> {
        (0u8..32).map(|i| i.wrapping_mul(73).wrapping_add(17)).collect()
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let wrapper = RootWrapper::new(&test_root_key(), "local").unwrap();
        let dek = generate_dek();
        let wrapped = wrapper.wrap(dek.expose_secret()).unwrap();
        let unwrapped = wrapper.unwrap(&wrapped).unwrap();
        assert_eq!(dek.expose_secret(), unwrapped.expose_secret());
    }

    #[test]
    fn unwrap_rejects_tampered_blob() {
        let wrapper = RootWrapper::new(&test_root_key(), "local").unwrap();
        let dek = generate_dek();
        let mut wrapped = wrapper.wrap(dek.expose_secret()).unwrap();
        let last = wrapped.len() - 1;
        wrapped[last] ^= 0x01;
        let err = wrapper.unwrap(&wrapped).unwrap_err();
        assert!(matches!(err, CryptoError::AuthFailure));
    }

    #[test]
    fn encrypt_decrypt_with_dek_roundtrip() {
        let dek = generate_dek();
        let aad = b"scope:alice";
        let ct = encrypt_with_dek(dek.expose_secret(), b"hello", aad).unwrap();
        let pt = decrypt_with_dek(dek.expose_secret(), &ct, aad).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn decrypt_fails_on_aad_mismatch() {
        let dek = generate_dek();
        let ct = encrypt_with_dek(dek.expose_secret(), b"hello", b"aad-a").unwrap();
        let err = decrypt_with_dek(dek.expose_secret(), &ct, b"aad-b").unwrap_err();
        assert!(matches!(err, CryptoError::AuthFailure));
    }

    #[test]
    fn decrypt_rejects_short_ciphertext() {
        let dek = generate_dek();
        let err = decrypt_with_dek(dek.expose_secret(), &[0u8; 4], b"").unwrap_err();
        assert!(matches!(err, CryptoError::Malformed));
    }

    #[test]
    fn successive_encrypts_produce_distinct_ciphertexts() {
        let dek = generate_dek();
        let a = encrypt_with_dek(dek.expose_secret(), b"same", b"").unwrap();
        let b = encrypt_with_dek(dek.expose_secret(), b"same", b"").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn new_rejects_weak_root_key() {
        let err = RootWrapper::new(&[0u8; 32], "local").unwrap_err();
        assert!(matches!(err, CryptoError::WeakKey(_)));
    }
}
