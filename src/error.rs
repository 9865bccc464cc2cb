//! Structured API errors.
//!
//! DESIGN
//! ======
//! Every service error enum implements [`ErrorCode`]. Handlers return
//! `Result<_, ApiError>` and rely on the blanket `From` impl below, so the
//! `?` operator is enough to turn a typed service failure into a JSON body:
//!
//! ```json
//! { "code": "E_NOT_FOUND", "message": "...", "retryable": false }
//! ```
//!
//! Server-side failures (5xx) never leak backend detail to the client; the
//! detail is logged and the body carries a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong, please try again";

/// Grepable error code, retryable flag, and HTTP status for API errors.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }

    fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// JSON error response returned by every API handler.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), retryable: false }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E_UNAUTHORIZED", "Authentication required")
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "E_BAD_REQUEST", message)
    }
}

impl<E: ErrorCode> From<E> for ApiError {
    fn from(err: E) -> Self {
        let status = err.status();
        let message = if status.is_server_error() {
            tracing::error!(code = err.error_code(), error = %err, "request failed");
            GENERIC_FAILURE_MESSAGE.to_owned()
        } else {
            err.to_string()
        };
        Self { status, code: err.error_code(), message, retryable: err.retryable() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
