//! Root-key validation: length, structural pattern, and Shannon entropy
//! checks that catch an obviously weak key without pretending to measure
//! true randomness.

use std::collections::HashMap;
use thiserror::Error;

pub const ROOT_KEY_LEN: usize = 32;
const MIN_SHANNON_BITS_PER_BYTE: f64 = 2.0;
const MIN_DISTINCT_BYTES: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyValidationError {
    #[error("root key must be exactly {ROOT_KEY_LEN} bytes, got {0}")]
    WrongLength(usize),

    #[error("root key has a weak, non-random structure")]
    WeakPattern,

    #[error("root key entropy is too low to be safely random")]
    LowEntropy,
}

/// Rejects root keys that are obviously not random: wrong size, all one
/// byte, a monotonic ramp, too few distinct byte values, or low Shannon
/// entropy. None of this proves the key is strong; it only catches
/// placeholder or accidentally-zeroed input.
pub fn validate_root_key(key: &[u8]) -> Result<(), KeyValidationError> {
    if key.len() != ROOT_KEY_LEN {
        return Err(KeyValidationError::WrongLength(key.len()));
    }

    if is_constant(key) || is_monotonic_ramp(key) {
        return Err(KeyValidationError::WeakPattern);
    }

    if distinct_byte_count(key) < MIN_DISTINCT_BYTES {
        return Err(KeyValidationError::LowEntropy);
    }

    if shannon_bits_per_byte(key) < MIN_SHANNON_BITS_PER_BYTE {
        return Err(KeyValidationError::LowEntropy);
    }

    Ok(())
}

fn is_constant(key: &[u8]) -> bool {
    matches!(key.first(), Some(first) if key.iter().all(|b| b == first))
}

fn is_monotonic_ramp(key: &[u8]) -> bool {
    let ascending = key
        .windows(2)
        .all(|w| w[1] == w[0].wrapping_add(1));
    let descending = key
        .windows(2)
        .all(|w| w[1] == w[0].wrapping_sub(1));
    ascending || descending
}

fn distinct_byte_count(key: &[u8]) -> usize {
    let mut seen = [false; 256];
    let mut count = 0;
    for &b in key {
        if !seen[b as usize] {
            seen[b as usize] = true;
            count += 1;
        }
    }
    count
}

fn shannon_bits_per_byte(key: &[u8]) -> f64 {
    let mut counts: HashMap<u8, usize> = HashMap::new();
    for &b in key {
        *counts.entry(b).or_insert(0) += 1;
    }

    let len = key.len() as f64;
    let mut entropy = 0.0;
    for count in counts.values() {
        let probability = *count as f64 / len;
        entropy -= probability * probability.log2();
    }
    entropy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        let err = validate_root_key(&[1u8; 16]).unwrap_err();
        assert_eq!(err, KeyValidationError::WrongLength(16));
    }

    #[test]
    fn rejects_all_zero() {
        let err = validate_root_key(&[0u8; ROOT_KEY_LEN]).unwrap_err();
        assert_eq!(err, KeyValidationError::WeakPattern);
    }

    #[test]
    fn rejects_all_0xff() {
        let err = validate_root_key(&[0xffu8; ROOT_KEY_LEN]).unwrap_err();
        assert_eq!(err, KeyValidationError::WeakPattern);
    }

    #[test]
    fn rejects_ascending_ramp() {
        let key: Vec<u8> = (0u8..32).collect();
        let err = validate_root_key(&key).unwrap_err();
        assert_eq!(err, KeyValidationError::WeakPattern);
    }

    #[test]
    fn rejects_descending_ramp() {
        let key: Vec<u8> = (0u8..32).rev().collect();
        let err = validate_root_key(&key).unwrap_err();
        assert_eq!(err, KeyValidationError::WeakPattern);
    }

    #[test]
    fn rejects_low_distinct_byte_count() {
        let mut key = vec![0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = (i % 4) as u8;
        }
        let err = validate_root_key(&key).unwrap_err();
        assert_eq!(err, KeyValidationError::LowEntropy);
    }

    #[test]
    fn accepts_plausible_random_key() {
        let key: Vec<u8> = (0u8..32)
            .map(|i| i.wrapping_mul(73).wrapping_add(17))
            .collect();
        validate_root_key(&key).expect("structurally varied key should pass");
    }
}
