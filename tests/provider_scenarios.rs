//! End-to-end scenarios against the `Provider` facade directly, without
//! going through HTTP.

use kmsd::provider::{Provider, ProviderError};
use tempfile::tempdir;

fn key_hex(seed: u8) -> String {
    (0u8..32)
        .map(|i| i.wrapping_mul(73).wrapping_add(17).wrapping_add(seed))
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn key_bytes(seed: u8) -> Vec<u8> {
    (0u8..32)
        .map(|i| i.wrapping_mul(73).wrapping_add(17).wrapping_add(seed))
        .collect()
}

#[test]
fn create_encrypt_decrypt_roundtrip() {
    let dir = tempdir().unwrap();
    let provider = Provider::open(dir.path(), &key_bytes(0), "local").unwrap();

    let created = provider.create_dek_for_scope("alice").unwrap();
    let encrypted = provider
        .encrypt_with_dek(&created.dek_id, b"hello", b"")
        .unwrap();
    let plaintext = provider
        .decrypt_with_dek(&created.dek_id, &encrypted.ciphertext, b"")
        .unwrap();

    assert_eq!(plaintext, b"hello");
}

#[test]
fn tampered_ciphertext_reports_auth_failure() {
    let dir = tempdir().unwrap();
    let provider = Provider::open(dir.path(), &key_bytes(0), "local").unwrap();
    let created = provider.create_dek_for_scope("alice").unwrap();

    let mut encrypted = provider
        .encrypt_with_dek(&created.dek_id, b"hello", b"")
        .unwrap();
    let last = encrypted.ciphertext.len() - 1;
    encrypted.ciphertext[last] ^= 0x01;

    let err = provider
        .decrypt_with_dek(&created.dek_id, &encrypted.ciphertext, b"")
        .unwrap_err();
    assert!(matches!(err, ProviderError::AuthFailure));
}

#[test]
fn encrypt_on_unknown_dek_is_not_found() {
    let dir = tempdir().unwrap();
    let provider = Provider::open(dir.path(), &key_bytes(0), "local").unwrap();

    let err = provider
        .encrypt_with_dek("does-not-exist", b"x", b"")
        .unwrap_err();
    assert!(matches!(err, ProviderError::UnknownDek(_)));
}

#[test]
fn all_zero_root_key_is_rejected_at_startup() {
    let dir = tempdir().unwrap();
    let err = Provider::open(dir.path(), &[0u8; 32], "local").unwrap_err();
    assert!(matches!(err, ProviderError::WeakKey(_)));
}

#[test]
fn rewrap_preserves_plaintext_decryptability() {
    let dir = tempdir().unwrap();
    let provider = Provider::open(dir.path(), &key_bytes(0), "local").unwrap();
    let created = provider.create_dek_for_scope("alice").unwrap();

    let encrypted = provider
        .encrypt_with_dek(&created.dek_id, b"rewrap-ok", b"")
        .unwrap();

    provider
        .rewrap_dek(&created.dek_id, &key_hex(1))
        .unwrap();

    let plaintext = provider
        .decrypt_with_dek(&created.dek_id, &encrypted.ciphertext, b"")
        .unwrap();
    assert_eq!(plaintext, b"rewrap-ok");
}

#[test]
fn wrapped_dek_and_ciphertexts_survive_process_restart() {
    let dir = tempdir().unwrap();
    let dek_id;
    let ciphertext;
    let wrapped_before;
    {
        let provider = Provider::open(dir.path(), &key_bytes(0), "local").unwrap();
        let created = provider.create_dek_for_scope("bob").unwrap();
        dek_id = created.dek_id.clone();
        wrapped_before = created.wrapped;
        ciphertext = provider
            .encrypt_with_dek(&created.dek_id, b"still-here", b"")
            .unwrap()
            .ciphertext;
        provider.close();
    }

    let provider = Provider::open(dir.path(), &key_bytes(0), "local").unwrap();
    let wrapped_after = provider.get_wrapped(&dek_id).unwrap();
    assert_eq!(wrapped_before, wrapped_after);

    let plaintext = provider
        .decrypt_with_dek(&dek_id, &ciphertext, b"")
        .unwrap();
    assert_eq!(plaintext, b"still-here");
}

#[test]
fn nonce_is_fresh_on_every_encrypt() {
    let dir = tempdir().unwrap();
    let provider = Provider::open(dir.path(), &key_bytes(0), "local").unwrap();
    let created = provider.create_dek_for_scope("alice").unwrap();

    let a = provider
        .encrypt_with_dek(&created.dek_id, b"same", b"")
        .unwrap();
    let b = provider
        .encrypt_with_dek(&created.dek_id, b"same", b"")
        .unwrap();

    assert_ne!(a.ciphertext, b.ciphertext);
}

#[test]
fn concurrent_encrypts_on_distinct_deks_all_succeed() {
    use std::sync::Arc;
    use std::thread;

    let dir = tempdir().unwrap();
    let provider = Arc::new(Provider::open(dir.path(), &key_bytes(0), "local").unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let provider = provider.clone();
            thread::spawn(move || {
                let created = provider
                    .create_dek_for_scope(&format!("scope-{i}"))
                    .unwrap();
                for _ in 0..20 {
                    let encrypted = provider
                        .encrypt_with_dek(&created.dek_id, b"payload", b"")
                        .unwrap();
                    let plaintext = provider
                        .decrypt_with_dek(&created.dek_id, &encrypted.ciphertext, b"")
                        .unwrap();
                    assert_eq!(plaintext, b"payload");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
