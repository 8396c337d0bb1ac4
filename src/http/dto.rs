//! Wire-level JSON shapes for the six HTTP endpoints. Binary fields are
//! standard base64 with padding; kept separate from the domain types in
//! [`crate::provider`] so the wire format can evolve independently.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDekRequest {
    pub thread_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateDekResponse {
    pub key_id: String,
    pub wrapped: String,
    pub kek_id: String,
    pub kek_version: String,
}

#[derive(Debug, Deserialize)]
pub struct GetWrappedQuery {
    pub key_id: String,
}

#[derive(Debug, Serialize)]
pub struct GetWrappedResponse {
    pub wrapped: String,
}

#[derive(Debug, Deserialize)]
pub struct EncryptRequest {
    pub key_id: String,
    pub plaintext: String,
    #[serde(default)]
    pub aad: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EncryptResponse {
    pub ciphertext: String,
    pub key_version: String,
}

#[derive(Debug, Deserialize)]
pub struct DecryptRequest {
    pub key_id: String,
    pub ciphertext: String,
    #[serde(default)]
    pub aad: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecryptResponse {
    pub plaintext: String,
}

#[derive(Debug, Deserialize)]
pub struct RewrapRequest {
    pub key_id: String,
    pub new_kek_hex: String,
}

#[derive(Debug, Serialize)]
pub struct RewrapResponse {
    pub status: String,
    pub key_id: String,
    pub wrapped: String,
    pub kek_id: String,
    pub kek_version: String,
}

pub fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>, String> {
    STANDARD
        .decode(value.as_bytes())
        .map_err(|_| format!("{field} is not valid base64"))
}

pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
