//! Extractors that replace axum's default `Json`/`Query` rejection bodies
//! with the `{"error", "code"}` envelope every other client-visible
//! failure in this service uses. A malformed body or a missing required
//! query parameter should look like any other `INVALID_INPUT` response,
//! not axum's plain-text default.

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

use super::dto::ErrorResponse;

pub struct Json<T>(pub T);

impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Json(value)),
            Err(rejection) => Err(invalid_input(rejection.to_string())),
        }
    }
}

pub struct Query<T>(pub T);

impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Query::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Query(value)) => Ok(Query(value)),
            Err(rejection) => Err(invalid_input(rejection.to_string())),
        }
    }
}

fn invalid_input(message: String) -> Response {
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
