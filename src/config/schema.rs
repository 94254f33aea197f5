//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::security::cors::CorsPolicy;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Built-in liveness endpoint.
    pub health: HealthConfig,

    /// CORS policy applied before proxying and routing.
    pub cors: CorsPolicy,

    /// Proxy rules, evaluated in file order.
    pub proxy: ProxySection,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest request body buffered before answering 413.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Path answered with a fixed 200 before any other stage.
    pub path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySection {
    /// Largest upstream response body relayed; bigger ones become 502.
    pub max_response_bytes: usize,

    pub rules: Vec<ProxyRuleConfig>,
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            max_response_bytes: 16 * 1024 * 1024, // 16MB
            rules: Vec::new(),
        }
    }
}

/// One proxy rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyRuleConfig {
    /// Identifier used to attach an interception handler from code.
    #[serde(default)]
    pub name: Option<String>,

    /// Path pattern; each `*` matches one component.
    pub pattern: String,

    /// Upstream base URL (e.g., "http://127.0.0.1:3000").
    #[serde(default)]
    pub target: Option<String>,

    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts after the first failure.
    #[serde(default)]
    pub retries: u32,

    /// Base delay between attempts; 0 retries immediately.
    #[serde(default)]
    pub retry_backoff_ms: u64,

    /// Headers set on every forwarded request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Emit an access record for every forwarded request.
    #[serde(default)]
    pub log: bool,
}

impl ProxyRuleConfig {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            name: None,
            pattern: pattern.into(),
            target: None,
            timeout_ms: default_timeout_ms(),
            retries: 0,
            retry_backoff_ms: 0,
            headers: BTreeMap::new(),
            enabled: true,
            log: false,
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
