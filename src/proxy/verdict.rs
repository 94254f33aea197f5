//! Interception handlers and the verdicts they return.

use std::collections::HashMap;
use std::future::Future;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::error::BoxError;
use crate::http::request::InboundRequest;

/// Decision returned by an interception handler.
#[derive(Debug)]
pub enum ProxyVerdict {
    /// Forward upstream. Every override is optional; headers win over the
    /// rule's static headers, `request` replaces the inbound request and
    /// `target` replaces the rule's upstream.
    Proceed {
        headers: HeaderMap,
        request: Option<InboundRequest>,
        target: Option<String>,
    },
    /// Answer with this response; nothing is forwarded.
    Block(Response),
    /// Ignore the rule and continue with local routing.
    Skip,
}

impl ProxyVerdict {
    /// Forward with no overrides.
    pub fn proceed() -> Self {
        ProxyVerdict::Proceed {
            headers: HeaderMap::new(),
            request: None,
            target: None,
        }
    }

    pub fn block(response: Response) -> Self {
        ProxyVerdict::Block(response)
    }

    /// Add a header override. No effect on `Block` or `Skip`.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        if let ProxyVerdict::Proceed { headers, .. } = &mut self {
            headers.insert(name, value);
        }
        self
    }

    /// Override the upstream. No effect on `Block` or `Skip`.
    pub fn with_target(mut self, new_target: impl Into<String>) -> Self {
        if let ProxyVerdict::Proceed { target, .. } = &mut self {
            *target = Some(new_target.into());
        }
        self
    }

    /// Replace the request sent upstream. No effect on `Block` or `Skip`.
    pub fn with_request(mut self, replacement: InboundRequest) -> Self {
        if let ProxyVerdict::Proceed { request, .. } = &mut self {
            *request = Some(replacement);
        }
        self
    }
}

/// What an interception handler receives.
#[derive(Debug, Clone)]
pub struct ProxyContext {
    pub request: InboundRequest,
    pub params: HashMap<String, String>,
    /// The rule's configured upstream, if any.
    pub target: Option<String>,
}

pub type VerdictFuture = BoxFuture<'static, Result<ProxyVerdict, BoxError>>;

/// Interception handler attached to a proxy rule.
pub trait ProxyHandler: Send + Sync + 'static {
    fn intercept(&self, ctx: ProxyContext) -> VerdictFuture;
}

impl<F, Fut> ProxyHandler for F
where
    F: Fn(ProxyContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ProxyVerdict, BoxError>> + Send + 'static,
{
    fn intercept(&self, ctx: ProxyContext) -> VerdictFuture {
        Box::pin((self)(ctx))
    }
}
