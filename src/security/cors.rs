//! CORS evaluation.
//!
//! # Responsibilities
//! - Detect and answer preflight requests
//! - Resolve the `Access-Control-Allow-Origin` value for a request origin
//! - Inject response headers on simple (non-preflight) requests
//!
//! # Design Decisions
//! - A disallowed origin never fails the request; the header is just omitted
//! - Credentialed requests never receive `*`; the request origin is echoed
//! - Method and header allow-lists are checked on preflight only

use axum::body::Body;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Origins a policy accepts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "OriginSetting", into = "OriginSetting")]
pub enum AllowedOrigin {
    /// `"*"` in configuration.
    Any,
    Exact(String),
    List(Vec<String>),
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(untagged)]
enum OriginSetting {
    One(String),
    Many(Vec<String>),
}

impl From<OriginSetting> for AllowedOrigin {
    fn from(setting: OriginSetting) -> Self {
        match setting {
            OriginSetting::One(origin) if origin == "*" => AllowedOrigin::Any,
            OriginSetting::One(origin) => AllowedOrigin::Exact(origin),
            OriginSetting::Many(origins) => AllowedOrigin::List(origins),
        }
    }
}

impl From<AllowedOrigin> for OriginSetting {
    fn from(origin: AllowedOrigin) -> Self {
        match origin {
            AllowedOrigin::Any => OriginSetting::One("*".to_string()),
            AllowedOrigin::Exact(origin) => OriginSetting::One(origin),
            AllowedOrigin::List(origins) => OriginSetting::Many(origins),
        }
    }
}

/// CORS policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsPolicy {
    pub enabled: bool,

    pub origin: AllowedOrigin,

    pub methods: Vec<String>,

    /// `None` reflects whatever the preflight asked for.
    pub allowed_headers: Option<Vec<String>>,

    pub exposed_headers: Vec<String>,

    pub credentials: bool,

    pub max_age_secs: Option<u64>,

    /// Status for a successful preflight.
    pub options_success_status: u16,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            origin: AllowedOrigin::Any,
            methods: ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_headers: None,
            exposed_headers: Vec::new(),
            credentials: false,
            max_age_secs: None,
            options_success_status: 204,
        }
    }
}

impl CorsPolicy {
    /// An enabled policy with defaults for everything else.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn origin(mut self, origin: AllowedOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn allowed_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    pub fn exposed_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exposed_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn credentials(mut self, credentials: bool) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn max_age_secs(mut self, secs: u64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }
}

/// Applies a [`CorsPolicy`] to requests and responses.
#[derive(Debug, Clone)]
pub struct CorsEvaluator {
    policy: CorsPolicy,
}

impl CorsEvaluator {
    pub fn new(policy: CorsPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CorsPolicy {
        &self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.policy.enabled
    }

    /// `OPTIONS` carrying `Access-Control-Request-Method`, under an enabled policy.
    pub fn is_preflight(&self, method: &Method, headers: &HeaderMap) -> bool {
        self.policy.enabled
            && method == Method::OPTIONS
            && headers.contains_key(ACCESS_CONTROL_REQUEST_METHOD)
    }

    /// Answer a preflight request.
    pub fn preflight(&self, headers: &HeaderMap) -> Response {
        let requested_method = headers
            .get(ACCESS_CONTROL_REQUEST_METHOD)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .trim();

        if !self.method_allowed(requested_method) {
            tracing::debug!(method = requested_method, "Preflight method rejected");
            return DispatchError::PreflightMethodRejected(requested_method.to_string())
                .into_response();
        }

        let requested_headers = header_list(headers.get(ACCESS_CONTROL_REQUEST_HEADERS));
        if let Some(allowed) = &self.policy.allowed_headers {
            let rejected = requested_headers
                .iter()
                .any(|name| !allowed.iter().any(|a| a.eq_ignore_ascii_case(name)));
            if rejected {
                tracing::debug!(headers = ?requested_headers, "Preflight headers rejected");
                return DispatchError::PreflightHeadersRejected.into_response();
            }
        }

        let status = StatusCode::from_u16(self.policy.options_success_status)
            .unwrap_or(StatusCode::NO_CONTENT);
        let mut response = (status, Body::empty()).into_response();
        let out = response.headers_mut();

        self.insert_origin(headers.get(ORIGIN), out);
        insert_joined(out, ACCESS_CONTROL_ALLOW_METHODS, &self.policy.methods);
        match &self.policy.allowed_headers {
            Some(allowed) => insert_joined(out, ACCESS_CONTROL_ALLOW_HEADERS, allowed),
            None => insert_joined(out, ACCESS_CONTROL_ALLOW_HEADERS, &requested_headers),
        }
        if self.policy.credentials {
            out.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if let Some(max_age) = self.policy.max_age_secs {
            out.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age));
        }

        response
    }

    /// Inject headers into the response of a non-preflight request.
    pub fn decorate(&self, origin: Option<&HeaderValue>, response: &mut Response) {
        if !self.policy.enabled {
            return;
        }
        let out = response.headers_mut();
        self.insert_origin(origin, out);
        if self.policy.credentials {
            out.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        insert_joined(out, ACCESS_CONTROL_EXPOSE_HEADERS, &self.policy.exposed_headers);
    }

    /// Value for `Access-Control-Allow-Origin`, or `None` to omit it.
    pub fn resolve_origin(&self, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
        match &self.policy.origin {
            AllowedOrigin::Any if !self.policy.credentials => Some(HeaderValue::from_static("*")),
            AllowedOrigin::Any => origin.cloned(),
            AllowedOrigin::Exact(allowed) => {
                origin.filter(|o| o.as_bytes() == allowed.as_bytes()).cloned()
            }
            AllowedOrigin::List(allowed) => origin
                .filter(|o| allowed.iter().any(|a| o.as_bytes() == a.as_bytes()))
                .cloned(),
        }
    }

    fn method_allowed(&self, method: &str) -> bool {
        !method.is_empty()
            && self
                .policy
                .methods
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(method))
    }

    fn insert_origin(&self, origin: Option<&HeaderValue>, out: &mut HeaderMap) {
        let Some(value) = self.resolve_origin(origin) else {
            return;
        };
        if value != "*" {
            out.append(VARY, HeaderValue::from_static("origin"));
        }
        out.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
}

fn header_list(value: Option<&HeaderValue>) -> Vec<String> {
    value
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_ascii_lowercase)
                .collect()
        })
        .unwrap_or_default()
}

fn insert_joined(out: &mut HeaderMap, name: axum::http::HeaderName, values: &[String]) {
    if values.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&values.join(",")) {
        out.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preflight_headers(origin: &str, method: &str, headers: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(ORIGIN, HeaderValue::from_str(origin).unwrap());
        map.insert(
            ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_str(method).unwrap(),
        );
        if let Some(headers) = headers {
            map.insert(
                ACCESS_CONTROL_REQUEST_HEADERS,
                HeaderValue::from_str(headers).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_credentials_never_echo_wildcard() {
        let cors = CorsEvaluator::new(CorsPolicy::enabled().credentials(true));
        let origin = HeaderValue::from_static("https://example.com");

        let mut response = Response::new(Body::empty());
        cors.decorate(Some(&origin), &mut response);

        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://example.com");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[VARY], "origin");
    }

    #[test]
    fn test_wildcard_without_origin_header() {
        let cors = CorsEvaluator::new(CorsPolicy::enabled());
        let mut response = Response::new(Body::empty());
        cors.decorate(None, &mut response);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response.headers().get(VARY).is_none());
    }

    #[test]
    fn test_credentialed_wildcard_without_origin_omits_header() {
        let cors = CorsEvaluator::new(CorsPolicy::enabled().credentials(true));
        assert!(cors.resolve_origin(None).is_none());
    }

    #[test]
    fn test_list_origin_membership() {
        let cors = CorsEvaluator::new(CorsPolicy::enabled().origin(AllowedOrigin::List(vec![
            "https://a.example".into(),
            "https://b.example".into(),
        ])));

        let allowed = HeaderValue::from_static("https://b.example");
        let denied = HeaderValue::from_static("https://evil.example");
        assert_eq!(cors.resolve_origin(Some(&allowed)), Some(allowed.clone()));
        assert_eq!(cors.resolve_origin(Some(&denied)), None);
    }

    #[test]
    fn test_preflight_rejects_method() {
        let cors = CorsEvaluator::new(CorsPolicy::enabled().methods(["GET", "POST"]));
        let response = cors.preflight(&preflight_headers("https://a.example", "DELETE", None));
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn test_preflight_rejects_headers() {
        let cors = CorsEvaluator::new(
            CorsPolicy::enabled().allowed_headers(["Content-Type", "Authorization"]),
        );
        let ok = cors.preflight(&preflight_headers(
            "https://a.example",
            "POST",
            Some("content-type, AUTHORIZATION"),
        ));
        assert_eq!(ok.status(), StatusCode::NO_CONTENT);

        let rejected = cors.preflight(&preflight_headers(
            "https://a.example",
            "POST",
            Some("content-type, x-secret"),
        ));
        assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_preflight_success_headers() {
        let cors = CorsEvaluator::new(
            CorsPolicy::enabled()
                .origin(AllowedOrigin::Exact("https://app.example".into()))
                .methods(["GET", "POST"])
                .credentials(true)
                .max_age_secs(600),
        );
        let response = cors.preflight(&preflight_headers(
            "https://app.example",
            "POST",
            Some("x-trace-id"),
        ));

        let headers = response.headers();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "GET,POST");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "x-trace-id");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[ACCESS_CONTROL_MAX_AGE], "600");
    }

    #[test]
    fn test_preflight_disallowed_origin_still_succeeds() {
        let mut policy =
            CorsPolicy::enabled().origin(AllowedOrigin::Exact("https://app.example".into()));
        policy.options_success_status = 200;
        let cors = CorsEvaluator::new(policy);

        let response = cors.preflight(&preflight_headers("https://other.example", "GET", None));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).is_some());
    }

    #[test]
    fn test_disabled_policy_is_inert() {
        let cors = CorsEvaluator::new(CorsPolicy::default());
        let headers = preflight_headers("https://a.example", "GET", None);
        assert!(!cors.is_preflight(&Method::OPTIONS, &headers));

        let mut response = Response::new(Body::empty());
        cors.decorate(Some(&HeaderValue::from_static("https://a.example")), &mut response);
        assert!(response.headers().is_empty());
    }

    #[test]
    fn test_origin_setting_deserialization() {
        #[derive(Deserialize)]
        struct Wrapper {
            origin: AllowedOrigin,
        }

        let any: Wrapper = toml::from_str(r#"origin = "*""#).unwrap();
        assert_eq!(any.origin, AllowedOrigin::Any);
        let exact: Wrapper = toml::from_str(r#"origin = "https://a.example""#).unwrap();
        assert_eq!(exact.origin, AllowedOrigin::Exact("https://a.example".into()));
    }
}
