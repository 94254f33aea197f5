//! Handler capability and the per-request context handed to it.
//!
//! Handlers are stored type-erased (`Arc<dyn RouteHandler>`) so a single
//! table can hold any mix of async functions. Any
//! `Fn(RequestContext) -> impl Future<Output = HandlerResult>` qualifies.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::response::Response;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::BoxError;
use crate::http::request::InboundRequest;

/// What a handler produces: a response, or an error the dispatcher turns into a 500.
pub type HandlerResult = Result<Response, BoxError>;

pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

/// A local route handler.
pub trait RouteHandler: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext) -> HandlerFuture;
}

impl<F, Fut> RouteHandler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> HandlerFuture {
        Box::pin((self)(ctx))
    }
}

pub type BoxedHandler = Arc<dyn RouteHandler>;

/// Request body as seen by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Body bytes exactly as received.
    Raw(Bytes),
    /// Value produced by the route's input validator.
    Validated(Value),
}

/// A query parameter; repeated keys collect into a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl QueryValue {
    pub fn first(&self) -> &str {
        match self {
            QueryValue::One(value) => value,
            QueryValue::Many(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }
}

/// Parse a raw query string into a map of single or repeated values.
pub fn parse_query(query: Option<&str>) -> HashMap<String, QueryValue> {
    let mut map: HashMap<String, QueryValue> = HashMap::new();
    let Some(query) = query else {
        return map;
    };

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = value.into_owned();
        match map.remove(key.as_ref()) {
            None => {
                map.insert(key.into_owned(), QueryValue::One(value));
            }
            Some(QueryValue::One(existing)) => {
                map.insert(key.into_owned(), QueryValue::Many(vec![existing, value]));
            }
            Some(QueryValue::Many(mut values)) => {
                values.push(value);
                map.insert(key.into_owned(), QueryValue::Many(values));
            }
        }
    }
    map
}

/// Everything a handler receives for one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request: InboundRequest,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, QueryValue>,
    pub body: Payload,
}

impl RequestContext {
    pub fn new(request: InboundRequest, params: HashMap<String, String>) -> Self {
        let query = parse_query(request.query());
        let body = Payload::Raw(request.body.clone());
        Self {
            request,
            params,
            query,
            body,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(QueryValue::first)
    }

    /// Decode the body as JSON, preferring the validated value when present.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.body {
            Payload::Validated(value) => serde_json::from_value(value.clone()),
            Payload::Raw(bytes) => serde_json::from_slice(bytes),
        }
    }
}

/// Rejection from an [`InputValidator`]; the message is shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationFailure {
    pub message: String,
}

impl ValidationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Hook for the schema-validation collaborator, run before the handler.
///
/// Returning `Ok(Some(value))` replaces the handler's payload with the
/// validated value.
pub trait InputValidator: Send + Sync + 'static {
    fn validate(&self, ctx: &RequestContext) -> Result<Option<Value>, ValidationFailure>;
}

impl<F> InputValidator for F
where
    F: Fn(&RequestContext) -> Result<Option<Value>, ValidationFailure> + Send + Sync + 'static,
{
    fn validate(&self, ctx: &RequestContext) -> Result<Option<Value>, ValidationFailure> {
        (self)(ctx)
    }
}

/// Documentation metadata, exposed read-only through `list_routes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl RouteMetadata {
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

/// Handler, validator and metadata registered for one method of a route.
#[derive(Clone)]
pub struct MethodRoute {
    handler: BoxedHandler,
    validator: Option<Arc<dyn InputValidator>>,
    metadata: RouteMetadata,
}

impl MethodRoute {
    pub fn new(handler: impl RouteHandler) -> Self {
        Self {
            handler: Arc::new(handler),
            validator: None,
            metadata: RouteMetadata::default(),
        }
    }

    pub fn with_validator(mut self, validator: impl InputValidator) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn with_metadata(mut self, metadata: RouteMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    pub fn validator(&self) -> Option<&Arc<dyn InputValidator>> {
        self.validator.as_ref()
    }

    pub fn metadata(&self) -> &RouteMetadata {
        &self.metadata
    }
}

impl std::fmt::Debug for MethodRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRoute")
            .field("validator", &self.validator.is_some())
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
