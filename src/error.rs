//! Error taxonomy.
//!
//! Startup errors (`PatternError`, `ConflictError`, `RuleError`, `BuildError`)
//! are returned to whoever builds the tables. Per-request failures are
//! [`DispatchError`]s: they always render as a stable JSON body and never
//! escape the dispatcher.

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::error_response;

/// Error type returned by route handlers and proxy interception handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A route or proxy pattern that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("catch-all segment `{name}` must be the last segment")]
    CatchAllNotLast { name: String },

    #[error("malformed token `{0}`")]
    MalformedToken(String),

    #[error("empty parameter name in token `{0}`")]
    EmptyParamName(String),

    #[error("parameter `{0}` is bound more than once")]
    DuplicateParam(String),

    #[error("pattern `{0}` must start with `/`")]
    MissingLeadingSlash(String),
}

/// A second handler registered for the same pattern and method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("route `{pattern}` already has a {method} handler")]
pub struct ConflictError {
    pub pattern: String,
    pub method: Method,
}

/// Reported by [`RouteTable::from_registrations`](crate::routing::RouteTable::from_registrations)
/// for every entry that was skipped or overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("invalid route {tokens:?}: {source}")]
    Pattern {
        tokens: Vec<String>,
        #[source]
        source: PatternError,
    },

    #[error(transparent)]
    Conflict(#[from] ConflictError),
}

/// A proxy rule that cannot be built from its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("invalid proxy pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("invalid header `{name}` on proxy rule `{pattern}`")]
    Header { pattern: String, name: String },
}

/// Failure while assembling a [`Dispatcher`](crate::dispatch::Dispatcher).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("no proxy rule named `{0}`")]
    UnknownRule(String),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Per-request failure, converted to a response at the dispatcher boundary.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route matches `{path}`")]
    RouteNotFound { path: String },

    #[error("method {method} not allowed for `{path}`")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    #[error("proxy rule `{pattern}` has no upstream target")]
    ProxyMisconfigured { pattern: String },

    #[error("upstream `{target}` timed out after {attempts} attempt(s)")]
    ProxyTimeout { target: String, attempts: u32 },

    #[error("upstream `{target}` unreachable after {attempts} attempt(s)")]
    ProxyUnreachable { target: String, attempts: u32 },

    #[error("handler failed: {0}")]
    HandlerFailure(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("request body could not be read")]
    BodyUnreadable,

    #[error("upstream `{target}` response exceeds {limit} bytes")]
    UpstreamTooLarge { target: String, limit: usize },

    #[error("preflight method `{0}` is not allowed")]
    PreflightMethodRejected(String),

    #[error("preflight requested headers that are not allowed")]
    PreflightHeadersRejected,
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::MethodNotAllowed { .. } | DispatchError::PreflightMethodRejected(_) => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            DispatchError::ProxyMisconfigured { .. }
            | DispatchError::ProxyTimeout { .. }
            | DispatchError::ProxyUnreachable { .. }
            | DispatchError::UpstreamTooLarge { .. } => StatusCode::BAD_GATEWAY,
            DispatchError::HandlerFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::InvalidInput(_) | DispatchError::BodyUnreadable => {
                StatusCode::BAD_REQUEST
            }
            DispatchError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchError::PreflightHeadersRejected => StatusCode::FORBIDDEN,
        }
    }

    /// Text safe to show the caller. Upstream and handler internals stay in the log.
    fn public_message(&self) -> String {
        match self {
            DispatchError::RouteNotFound { path } => format!("no route matches {path}"),
            DispatchError::MethodNotAllowed { method, path, .. } => {
                format!("method {method} is not allowed for {path}")
            }
            DispatchError::ProxyMisconfigured { .. } => {
                "proxy rule has no upstream target".to_string()
            }
            DispatchError::ProxyTimeout { .. } => "upstream request timed out".to_string(),
            DispatchError::ProxyUnreachable { .. } => "upstream service unreachable".to_string(),
            DispatchError::HandlerFailure(_) => "internal server error".to_string(),
            DispatchError::InvalidInput(message) => message.clone(),
            DispatchError::PayloadTooLarge { limit } => {
                format!("request body exceeds {limit} bytes")
            }
            DispatchError::BodyUnreadable => "request body could not be read".to_string(),
            DispatchError::UpstreamTooLarge { .. } => {
                "upstream response too large".to_string()
            }
            DispatchError::PreflightMethodRejected(method) => {
                format!("method {method} is not allowed by CORS policy")
            }
            DispatchError::PreflightHeadersRejected => {
                "requested headers are not allowed by CORS policy".to_string()
            }
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let mut response = error_response(self.status(), self.public_message());

        if let DispatchError::MethodNotAllowed { allowed, .. } = &self {
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }

        response
    }
}
