//! Dispatcher construction.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::dispatch::dispatcher::Dispatcher;
use crate::error::BuildError;
use crate::proxy::{
    ProxyExecutor, ProxyHandler, ProxyMatcher, ProxyRule, DEFAULT_MAX_RESPONSE_BYTES,
};
use crate::routing::RouteTable;
use crate::security::{CorsEvaluator, CorsPolicy};

const DEFAULT_HEALTH_PATH: &str = "/health";
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Assembles a [`Dispatcher`]. Everything given here is frozen by `build`.
pub struct DispatcherBuilder {
    routes: RouteTable,
    rules: Vec<ProxyRule>,
    cors: CorsPolicy,
    health_path: String,
    max_body_bytes: usize,
    max_response_bytes: usize,
    client: Option<reqwest::Client>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            routes: RouteTable::new(),
            rules: Vec::new(),
            cors: CorsPolicy::default(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            client: None,
        }
    }

    /// Start from a loaded configuration: CORS policy, health path, body
    /// limits and proxy rules. Routes and interception handlers come from code.
    pub fn from_config(config: &ServerConfig) -> Result<Self, BuildError> {
        let rules = config
            .proxy
            .rules
            .iter()
            .map(ProxyRule::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rules,
            cors: config.cors.clone(),
            health_path: config.health.path.clone(),
            max_body_bytes: config.listener.max_body_bytes,
            max_response_bytes: config.proxy.max_response_bytes,
            ..Self::new()
        })
    }

    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// Append a rule; rules are matched in the order they were added.
    pub fn proxy_rule(mut self, rule: ProxyRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Attach an interception handler to every rule named `name`.
    pub fn intercept(mut self, name: &str, handler: impl ProxyHandler) -> Result<Self, BuildError> {
        let handler: Arc<dyn ProxyHandler> = Arc::new(handler);
        let mut attached = 0;

        for rule in self
            .rules
            .iter_mut()
            .filter(|rule| rule.rule_name() == Some(name))
        {
            rule.set_handler(Arc::clone(&handler));
            attached += 1;
        }

        if attached == 0 {
            return Err(BuildError::UnknownRule(name.to_string()));
        }
        Ok(self)
    }

    pub fn cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = policy;
        self
    }

    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Cap on a relayed upstream body.
    pub fn max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    /// Use a preconfigured client for upstream calls.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let executor = match self.client {
            Some(client) => ProxyExecutor::with_client(client),
            None => ProxyExecutor::new()?,
        }
        .max_response_bytes(self.max_response_bytes);

        tracing::debug!(
            routes = self.routes.len(),
            proxy_rules = self.rules.len(),
            cors = self.cors.enabled,
            "Dispatcher built"
        );

        Ok(Dispatcher {
            routes: self.routes,
            proxy: ProxyMatcher::new(self.rules),
            executor,
            cors: CorsEvaluator::new(self.cors),
            health_path: self.health_path,
            max_body_bytes: self.max_body_bytes,
        })
    }
}
