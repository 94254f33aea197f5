//! Forwarding a matched request upstream.
//!
//! # Responsibilities
//! - Run the rule's interception handler and act on its verdict
//! - Build the outbound request (method, body, path and query preserved)
//! - Retry transport failures and timeouts within the rule's budget
//! - Relay the upstream status, headers and body
//!
//! # Design Decisions
//! - Handler errors and panics become 500 and are never retried
//! - Upstream error statuses are relayed, not retried
//! - Upstream bodies are buffered up to a cap; anything larger is a 502 and
//!   is not retried
//! - Transport error text stays in the log; callers see a fixed 502 body

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use reqwest::Url;

use crate::error::DispatchError;
use crate::http::request::InboundRequest;
use crate::observability::metrics;
use crate::observability::PROXY_ACCESS_TARGET;
use crate::proxy::matcher::ProxyMatch;
use crate::proxy::verdict::{ProxyContext, ProxyVerdict};
use crate::resilience::AttemptError;
use crate::security::headers::{apply_overrides, outbound_headers, strip_hop_by_hop};

/// Result of running a matched proxy rule.
#[derive(Debug)]
pub enum ProxyOutcome {
    /// Terminal response: relayed, blocked, or an error body.
    Respond(Response),
    /// The interception handler declined; continue with local routing.
    Skip,
}

/// Default cap on a buffered upstream response body.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

struct Upstream {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

enum Fetched {
    Complete(Upstream),
    Oversized,
}

#[derive(Debug, Clone)]
pub struct ProxyExecutor {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl ProxyExecutor {
    /// Executor with a client that ignores proxy environment variables and
    /// never follows redirects.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Largest upstream body relayed; bigger responses become 502.
    pub fn max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    pub async fn execute(&self, matched: ProxyMatch, request: InboundRequest) -> ProxyOutcome {
        match self.try_execute(matched, request).await {
            Ok(outcome) => outcome,
            Err(err) => ProxyOutcome::Respond(err.into_response()),
        }
    }

    async fn try_execute(
        &self,
        matched: ProxyMatch,
        request: InboundRequest,
    ) -> Result<ProxyOutcome, DispatchError> {
        let rule = Arc::clone(&matched.rule);
        let request_id = request.request_id().to_string();

        let verdict = match rule.interceptor() {
            None => ProxyVerdict::proceed(),
            Some(handler) => {
                let handler = Arc::clone(handler);
                let ctx = ProxyContext {
                    request: request.clone(),
                    params: matched.param_map(),
                    target: rule.configured_target().map(str::to_string),
                };

                match AssertUnwindSafe(async move { handler.intercept(ctx).await })
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(verdict)) => verdict,
                    Ok(Err(err)) => {
                        tracing::error!(
                            request_id = %request_id,
                            pattern = %rule.pattern(),
                            error = %err,
                            "Proxy interception handler failed"
                        );
                        return Err(DispatchError::HandlerFailure(err.to_string()));
                    }
                    Err(_) => {
                        tracing::error!(
                            request_id = %request_id,
                            pattern = %rule.pattern(),
                            "Proxy interception handler panicked"
                        );
                        return Err(DispatchError::HandlerFailure("handler panicked".into()));
                    }
                }
            }
        };

        let (overrides, request, target_override) = match verdict {
            ProxyVerdict::Block(response) => {
                tracing::debug!(request_id = %request_id, pattern = %rule.pattern(), "Proxy request blocked");
                return Ok(ProxyOutcome::Respond(response));
            }
            ProxyVerdict::Skip => {
                tracing::debug!(request_id = %request_id, pattern = %rule.pattern(), "Proxy rule skipped");
                return Ok(ProxyOutcome::Skip);
            }
            ProxyVerdict::Proceed {
                headers,
                request: replacement,
                target,
            } => (headers, replacement.unwrap_or(request), target),
        };

        let target = target_override
            .or_else(|| rule.configured_target().map(str::to_string))
            .ok_or_else(|| {
                tracing::error!(pattern = %rule.pattern(), "Proxy rule has no target");
                DispatchError::ProxyMisconfigured {
                    pattern: rule.pattern().to_string(),
                }
            })?;

        let url = upstream_url(&target, &request).map_err(|e| {
            tracing::error!(target_url = %target, error = %e, "Invalid upstream target");
            DispatchError::ProxyMisconfigured {
                pattern: rule.pattern().to_string(),
            }
        })?;

        let mut headers = outbound_headers(&request.headers);
        apply_overrides(&mut headers, rule.headers());
        apply_overrides(&mut headers, &overrides);

        let policy = rule.retry_policy();
        let client = &self.client;
        let limit = self.max_response_bytes;
        let result = policy
            .run(
                |attempt| {
                    tracing::debug!(request_id = %request_id, url = %url, attempt, "Forwarding request");
                    let outbound = client
                        .request(request.method.clone(), url.clone())
                        .headers(headers.clone())
                        .body(request.body.clone());
                    async move {
                        let mut response = outbound.send().await?;
                        let status = response.status();
                        let headers = response.headers().clone();
                        if response
                            .content_length()
                            .is_some_and(|len| len > limit as u64)
                        {
                            return Ok(Fetched::Oversized);
                        }

                        let mut body = Vec::new();
                        while let Some(chunk) = response.chunk().await? {
                            if body.len() + chunk.len() > limit {
                                return Ok(Fetched::Oversized);
                            }
                            body.extend_from_slice(&chunk);
                        }
                        Ok::<_, reqwest::Error>(Fetched::Complete(Upstream {
                            status,
                            headers,
                            body: Bytes::from(body),
                        }))
                    }
                },
                |attempt, error| match error {
                    AttemptError::TimedOut => {
                        metrics::record_proxy_attempt("timeout");
                        tracing::warn!(
                            request_id = %request_id,
                            upstream = %target,
                            attempt,
                            timeout = ?policy.timeout(),
                            "Upstream attempt timed out"
                        );
                    }
                    AttemptError::Failed(e) => {
                        metrics::record_proxy_attempt("failure");
                        tracing::warn!(
                            request_id = %request_id,
                            upstream = %target,
                            attempt,
                            error = %e,
                            "Upstream attempt failed"
                        );
                    }
                },
            )
            .await;

        match result {
            Ok(Fetched::Oversized) => {
                metrics::record_proxy_attempt("failure");
                if rule.logs_access() {
                    tracing::info!(
                        target: PROXY_ACCESS_TARGET,
                        request_id = %request_id,
                        method = %request.method,
                        path = %request.path(),
                        upstream = %target,
                        outcome = "failure",
                        "proxy access"
                    );
                }
                tracing::error!(
                    request_id = %request_id,
                    upstream = %target,
                    limit,
                    "Upstream response over limit"
                );
                Err(DispatchError::UpstreamTooLarge { target, limit })
            }
            Ok(Fetched::Complete(upstream)) => {
                metrics::record_proxy_attempt("success");
                if rule.logs_access() {
                    tracing::info!(
                        target: PROXY_ACCESS_TARGET,
                        request_id = %request_id,
                        method = %request.method,
                        path = %request.path(),
                        upstream = %target,
                        status = upstream.status.as_u16(),
                        outcome = "success",
                        "proxy access"
                    );
                }
                Ok(ProxyOutcome::Respond(relay(upstream)))
            }
            Err((error, attempts)) => {
                let (outcome, err) = match error {
                    AttemptError::TimedOut => (
                        "timeout",
                        DispatchError::ProxyTimeout {
                            target: target.clone(),
                            attempts,
                        },
                    ),
                    AttemptError::Failed(_) => (
                        "failure",
                        DispatchError::ProxyUnreachable {
                            target: target.clone(),
                            attempts,
                        },
                    ),
                };
                if rule.logs_access() {
                    tracing::info!(
                        target: PROXY_ACCESS_TARGET,
                        request_id = %request_id,
                        method = %request.method,
                        path = %request.path(),
                        upstream = %target,
                        attempts,
                        outcome,
                        "proxy access"
                    );
                }
                tracing::error!(request_id = %request_id, error = %err, "Upstream request failed");
                Err(err)
            }
        }
    }
}

/// `target` (trailing slashes dropped) followed by the request path and query.
fn upstream_url(target: &str, request: &InboundRequest) -> Result<Url, String> {
    let url = Url::parse(&format!(
        "{}{}",
        target.trim_end_matches('/'),
        request.path_and_query()
    ))
    .map_err(|e| e.to_string())?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        scheme => Err(format!("unsupported upstream scheme `{scheme}`")),
    }
}

fn relay(upstream: Upstream) -> Response {
    let Upstream {
        status,
        mut headers,
        body,
    } = upstream;
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
