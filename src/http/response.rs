//! Response helpers.
//!
//! # Responsibilities
//! - Render the structured JSON error body `{error, message, status}`
//! - Build the fixed liveness response
//!
//! # Design Decisions
//! - `error` is the canonical reason phrase, so the shape is stable per status
//! - Bodies never carry upstream or handler internals

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// JSON body produced by the core for every error it generates itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
            status: status.as_u16(),
        }
    }
}

/// Build a response carrying an [`ErrorBody`].
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(status, message))).into_response()
}

/// Response for the built-in liveness path.
pub fn health_response() -> Response {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_uses_reason_phrase() {
        let body = ErrorBody::new(StatusCode::BAD_GATEWAY, "upstream request timed out");
        assert_eq!(body.error, "Bad Gateway");
        assert_eq!(body.status, 502);
    }

    #[test]
    fn test_error_response_is_json() {
        let response = error_response(StatusCode::NOT_FOUND, "nope");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "application/json"
        );
    }
}
