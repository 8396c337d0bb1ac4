use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::provider::{Provider, ProviderError};

use super::dto::*;
use super::extract::{Json, Query};

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<Provider>,
}

fn error_response(err: &ProviderError) -> Response {
    let (status, code) = match err {
        ProviderError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        ProviderError::Malformed => (StatusCode::BAD_REQUEST, "MALFORMED"),
        ProviderError::WeakKey(_) => (StatusCode::BAD_REQUEST, "WEAK_KEY"),
        ProviderError::UnknownDek(_) => (StatusCode::NOT_FOUND, "UNKNOWN_DEK"),
        ProviderError::AuthFailure => (StatusCode::FORBIDDEN, "AUTH_FAILURE"),
        ProviderError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE"),
        ProviderError::Closed => (StatusCode::INTERNAL_SERVER_ERROR, "CLOSED"),
        ProviderError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
    };

    tracing::warn!(error = %err, code, "provider operation failed");

    (
        status,
        axum::Json(ErrorResponse {
            error: err.to_string(),
            code: code.to_string(),
        }),
    )
        .into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    let message = message.into();
    tracing::warn!(error = %message, code = "INVALID_INPUT", "request rejected");
    (
        StatusCode::BAD_REQUEST,
        axum::Json(ErrorResponse {
            error: message,
            code: "INVALID_INPUT".to_string(),
        }),
    )
        .into_response()
}

pub async fn create_dek_for_thread(
    State(state): State<AppState>,
    Json(req): Json<CreateDekRequest>,
) -> Response {
    match state.provider.create_dek_for_scope(&req.thread_id) {
        Ok(created) => axum::Json(CreateDekResponse {
            key_id: created.dek_id,
            wrapped: encode_b64(&created.wrapped),
            kek_id: created.root_key_id,
            kek_version: String::new(),
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn get_wrapped(
    State(state): State<AppState>,
    Query(query): Query<GetWrappedQuery>,
) -> Response {
    match state.provider.get_wrapped(&query.key_id) {
        Ok(wrapped) => axum::Json(GetWrappedResponse {
            wrapped: encode_b64(&wrapped),
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn encrypt(State(state): State<AppState>, Json(req): Json<EncryptRequest>) -> Response {
    let plaintext = match decode_b64("plaintext", &req.plaintext) {
        Ok(bytes) => bytes,
        Err(message) => return bad_request(message),
    };
    let aad = match req.aad.as_deref().map(|a| decode_b64("aad", a)).transpose() {
        Ok(aad) => aad.unwrap_or_default(),
        Err(message) => return bad_request(message),
    };

    match state
        .provider
        .encrypt_with_dek(&req.key_id, &plaintext, &aad)
    {
        Ok(encrypted) => axum::Json(EncryptResponse {
            ciphertext: encode_b64(&encrypted.ciphertext),
            key_version: encrypted.root_key_id,
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn decrypt(State(state): State<AppState>, Json(req): Json<DecryptRequest>) -> Response {
    let ciphertext = match decode_b64("ciphertext", &req.ciphertext) {
        Ok(bytes) => bytes,
        Err(message) => return bad_request(message),
    };
    let aad = match req.aad.as_deref().map(|a| decode_b64("aad", a)).transpose() {
        Ok(aad) => aad.unwrap_or_default(),
        Err(message) => return bad_request(message),
    };

    match state
        .provider
        .decrypt_with_dek(&req.key_id, &ciphertext, &aad)
    {
        Ok(plaintext) => axum::Json(DecryptResponse {
            plaintext: encode_b64(&plaintext),
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn rewrap(State(state): State<AppState>, Json(req): Json<RewrapRequest>) -> Response {
    match state.provider.rewrap_dek(&req.key_id, &req.new_kek_hex) {
        Ok(rewrapped) => axum::Json(RewrapResponse {
            status: "ok".to_string(),
            key_id: req.key_id,
            wrapped: encode_b64(&rewrapped.wrapped),
            kek_id: rewrapped.root_key_id,
            kek_version: String::new(),
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn healthz(State(state): State<AppState>) -> Response {
    if state.provider.health() {
        (StatusCode::OK, "ok").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable").into_response()
    }
}
