//! Proxy rule compilation.
//!
//! A proxy pattern is a `/`-separated path where a component made only of
//! `*` is a wildcard. Wildcards bind `param0`, `param1`, ... from left to
//! right; the last segment, if a wildcard, captures the rest of the path.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::ProxyRuleConfig;
use crate::error::{PatternError, RuleError};
use crate::proxy::verdict::ProxyHandler;
use crate::resilience::RetryPolicy;
use crate::routing::segment::{match_segments, split_path, Segment};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Compile a proxy pattern into `Static` and `Wildcard` segments.
pub fn compile_proxy_pattern(pattern: &str) -> Result<Vec<Segment>, PatternError> {
    if !pattern.starts_with('/') {
        return Err(PatternError::MissingLeadingSlash(pattern.to_string()));
    }

    let components = split_path(pattern);
    let last = components.len().saturating_sub(1);
    let mut index = 0;
    let mut segments = Vec::with_capacity(components.len());

    for (position, component) in components.iter().enumerate() {
        if component.is_empty() {
            return Err(PatternError::MalformedToken(pattern.to_string()));
        }
        if component.chars().all(|c| c == '*') {
            segments.push(Segment::Wildcard {
                index,
                trailing: position == last,
            });
            index += 1;
        } else {
            segments.push(Segment::Static((*component).to_string()));
        }
    }

    Ok(segments)
}

/// An operator-defined forwarding rule.
#[derive(Clone)]
pub struct ProxyRule {
    name: Option<String>,
    pattern: String,
    segments: Vec<Segment>,
    target: Option<String>,
    handler: Option<Arc<dyn ProxyHandler>>,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
    headers: HeaderMap,
    enabled: bool,
    log: bool,
}

impl ProxyRule {
    pub fn new(pattern: impl Into<String>) -> Result<Self, PatternError> {
        let pattern = pattern.into();
        let segments = compile_proxy_pattern(&pattern)?;
        Ok(Self {
            name: None,
            pattern,
            segments,
            target: None,
            handler: None,
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
            backoff: Duration::ZERO,
            headers: HeaderMap::new(),
            enabled: true,
            log: false,
        })
    }

    /// Build a rule from its configuration entry. The interception handler,
    /// if any, is attached later by name.
    pub fn from_config(config: &ProxyRuleConfig) -> Result<Self, RuleError> {
        let mut rule = Self::new(config.pattern.clone())?
            .timeout(Duration::from_millis(config.timeout_ms))
            .retries(config.retries)
            .backoff(Duration::from_millis(config.retry_backoff_ms))
            .enabled(config.enabled)
            .logging(config.log);

        rule.name = config.name.clone();
        rule.target = config.target.clone();

        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes());
            let header_value = HeaderValue::from_str(value);
            match (header_name, header_value) {
                (Ok(name), Ok(value)) => {
                    rule.headers.insert(name, value);
                }
                _ => {
                    return Err(RuleError::Header {
                        pattern: config.pattern.clone(),
                        name: name.clone(),
                    })
                }
            }
        }

        Ok(rule)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn handler(mut self, handler: impl ProxyHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn set_handler(&mut self, handler: Arc<dyn ProxyHandler>) {
        self.handler = Some(handler);
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Static header set on every forwarded request.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn logging(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn rule_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn configured_target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn interceptor(&self) -> Option<&Arc<dyn ProxyHandler>> {
        self.handler.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn logs_access(&self) -> bool {
        self.log
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.timeout).with_backoff(self.backoff)
    }

    /// Wildcard values bound by `path`, in order, or `None` on mismatch.
    pub fn match_path(&self, path: &str) -> Option<Vec<String>> {
        match_segments(&self.segments, &split_path(path))
    }

    /// Same as [`match_path`](Self::match_path), keyed `param0..paramN`.
    pub fn match_params(&self, path: &str) -> Option<HashMap<String, String>> {
        self.match_path(path).map(param_map)
    }
}

pub(crate) fn param_map(values: Vec<String>) -> HashMap<String, String> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| (format!("param{index}"), value))
        .collect()
}

impl fmt::Debug for ProxyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("target", &self.target)
            .field("intercepted", &self.handler.is_some())
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("enabled", &self.enabled)
            .field("log", &self.log)
            .finish()
    }
}
