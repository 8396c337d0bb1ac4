//! The HTTP transport: translates the six JSON endpoints to
//! [`crate::provider::Provider`] calls. Thin by design — parsing,
//! base64 decode, and status-code mapping live here; no cryptography
//! does.

mod dto;
mod extract;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::provider::Provider;
use handlers::AppState;

pub fn build_router(provider: Arc<Provider>) -> Router {
    let state = AppState { provider };

    Router::new()
        .route("/create_dek_for_thread", post(handlers::create_dek_for_thread))
        .route("/get_wrapped", get(handlers::get_wrapped))
        .route("/encrypt", post(handlers::encrypt))
        .route("/decrypt", post(handlers::decrypt))
        .route("/rewrap", post(handlers::rewrap))
        .route("/healthz", get(handlers::healthz))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}
