//! Per-request state machine.
//!
//! # Stages (first terminal stage wins)
//! 1. Health path: fixed 200, nothing else runs
//! 2. CORS preflight
//! 3. Proxy: forward, block, or skip back to local routing
//! 4. Local routing: 404 / 405 / validation / handler
//! 5. CORS header injection on everything but health and preflight
//!
//! Every failure is turned into a response here; nothing escapes to the
//! transport.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::header::ORIGIN;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use tracing::Instrument;

use crate::dispatch::builder::DispatcherBuilder;
use crate::error::DispatchError;
use crate::http::request::{InboundRequest, X_REQUEST_ID};
use crate::http::response::health_response;
use crate::observability::metrics;
use crate::proxy::{ProxyExecutor, ProxyMatcher, ProxyOutcome};
use crate::routing::{Payload, RequestContext, RouteInfo, RouteTable};
use crate::security::CorsEvaluator;

/// Stage that produced the terminal response, used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Health,
    Preflight,
    Proxy,
    Route,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Health => "health",
            Stage::Preflight => "preflight",
            Stage::Proxy => "proxy",
            Stage::Route => "route",
            Stage::Error => "error",
        }
    }
}

/// Routes every inbound request through health, CORS, proxy and local routes.
#[derive(Debug)]
pub struct Dispatcher {
    pub(crate) routes: RouteTable,
    pub(crate) proxy: ProxyMatcher,
    pub(crate) executor: ProxyExecutor,
    pub(crate) cors: CorsEvaluator,
    pub(crate) health_path: String,
    pub(crate) max_body_bytes: usize,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn proxy_rules(&self) -> &ProxyMatcher {
        &self.proxy
    }

    pub fn cors(&self) -> &CorsEvaluator {
        &self.cors
    }

    pub fn health_path(&self) -> &str {
        &self.health_path
    }

    /// Route descriptions for documentation collaborators.
    pub fn list_routes(&self) -> Vec<RouteInfo> {
        self.routes.list_routes()
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let span = tracing::info_span!(
            "dispatch",
            request_id = %request_id,
            method = %method,
            path = %request.uri().path(),
        );

        let (stage, response) = self.run(request).instrument(span.clone()).await;

        span.in_scope(|| {
            tracing::debug!(
                stage = stage.as_str(),
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "Request completed"
            );
        });
        metrics::record_request(
            method.as_str(),
            response.status().as_u16(),
            stage.as_str(),
            start,
        );

        response
    }

    async fn run(&self, request: Request<Body>) -> (Stage, Response) {
        if request.uri().path() == self.health_path {
            return (Stage::Health, health_response());
        }

        if self.cors.is_preflight(request.method(), request.headers()) {
            return (Stage::Preflight, self.cors.preflight(request.headers()));
        }

        let origin = request.headers().get(ORIGIN).cloned();
        let (stage, mut response) =
            match InboundRequest::buffer(request, self.max_body_bytes).await {
                Ok(inbound) => self.forward_or_route(inbound).await,
                Err(err) => (Stage::Error, err.into_response()),
            };

        self.cors.decorate(origin.as_ref(), &mut response);
        (stage, response)
    }

    async fn forward_or_route(&self, request: InboundRequest) -> (Stage, Response) {
        if let Some(matched) = self.proxy.find(request.path()) {
            tracing::debug!(pattern = %matched.rule.pattern(), "Proxy rule matched");
            match self.executor.execute(matched, request.clone()).await {
                ProxyOutcome::Respond(response) => return (Stage::Proxy, response),
                ProxyOutcome::Skip => {}
            }
        }

        match self.route(request).await {
            Ok(response) => (Stage::Route, response),
            Err(err) => {
                tracing::debug!(error = %err, "Local routing failed");
                (Stage::Error, err.into_response())
            }
        }
    }

    async fn route(&self, request: InboundRequest) -> Result<Response, DispatchError> {
        let Some(found) = self.routes.resolve(request.path()).matched() else {
            return Err(DispatchError::RouteNotFound {
                path: request.path().to_string(),
            });
        };
        let entry = found.entry;

        let Some(route) = entry.method(&request.method) else {
            return Err(DispatchError::MethodNotAllowed {
                method: request.method.clone(),
                path: request.path().to_string(),
                allowed: entry.allowed_methods(),
            });
        };

        let params = found.params_for(&request.method);
        let mut ctx = RequestContext::new(request, params);

        if let Some(validator) = route.validator() {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| validator.validate(&ctx)));
            match outcome {
                Ok(Ok(Some(value))) => ctx.body = Payload::Validated(value),
                Ok(Ok(None)) => {}
                Ok(Err(failure)) => return Err(DispatchError::InvalidInput(failure.to_string())),
                Err(_) => {
                    tracing::error!(pattern = %entry.pattern(), "Input validator panicked");
                    return Err(DispatchError::HandlerFailure("validator panicked".into()));
                }
            }
        }

        let handler = Arc::clone(route.handler());
        match AssertUnwindSafe(async move { handler.call(ctx).await })
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => {
                tracing::error!(pattern = %entry.pattern(), error = %err, "Route handler failed");
                Err(DispatchError::HandlerFailure(err.to_string()))
            }
            Err(_) => {
                tracing::error!(pattern = %entry.pattern(), "Route handler panicked");
                Err(DispatchError::HandlerFailure("handler panicked".into()))
            }
        }
    }
}
