//! The byte layout shared by wrapped DEKs and per-DEK ciphertexts:
//! `nonce(12) || ciphertext || tag(16)`, with the tag folded into the
//! ciphertext by the `aes-gcm` crate's `encrypt`/`decrypt` calls.

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Concatenates a nonce and an AEAD ciphertext-with-tag into the single
/// blob stored at rest and sent on the wire.
pub fn assemble(nonce: &[u8], ciphertext_with_tag: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nonce.len() + ciphertext_with_tag.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(ciphertext_with_tag);
    out
}

/// Splits a blob into `(nonce, ciphertext_with_tag)`. Returns `None` if
/// the blob is too short to contain a nonce and a tag.
pub fn split(blob: &[u8]) -> Option<(&[u8], &[u8])> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return None;
    }
    Some(blob.split_at(NONCE_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_then_split_roundtrips() {
        let nonce = [1u8; NONCE_LEN];
        let ct = vec![2u8; 32 + TAG_LEN];
        let blob = assemble(&nonce, &ct);
        let (n, c) = split(&blob).unwrap();
        assert_eq!(n, nonce);
        assert_eq!(c, ct.as_slice());
    }

    #[test]
    fn split_rejects_too_short() {
        assert!(split(&[0u8; NONCE_LEN + TAG_LEN - 1]).is_none());
    }
}
