//! HTTP error responses.
//!
//! Every failure renders as `{ "error": "<CODE>", "message": "<reason>" }`.
//! Upstream 5xx maps to 502, internal failures to 500, everything else
//! (bad input, blocked targets, timeouts, upstream 4xx) to 400.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use unfurl_core::Error;

/// Errors returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("MISSING_PARAMETER: query parameter `{0}` is required")]
    MissingParameter(&'static str),

    #[error(transparent)]
    Service(#[from] Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingParameter(_) => "MISSING_PARAMETER",
            ApiError::Service(err) => err.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(err) if err.is_upstream_failure() => StatusCode::BAD_GATEWAY,
            ApiError::Service(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("request failed with {}: {}", status.as_u16(), self);
        } else {
            tracing::debug!("request rejected with {}: {}", status.as_u16(), self);
        }

        let body = ErrorBody { error: self.code(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}
