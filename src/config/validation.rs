//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, paths, upstream URLs and header values
//! - Validate value ranges (timeouts > 0, success status is 2xx)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, Method};
use thiserror::Error;
use url::Url;

use crate::config::schema::ServerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address `{value}`")]
    InvalidAddress { field: &'static str, value: String },

    #[error("health path `{0}` must start with `/`")]
    InvalidHealthPath(String),

    #[error("proxy pattern `{0}` must start with `/`")]
    InvalidPattern(String),

    #[error("proxy rule `{pattern}` has invalid target `{target}`")]
    InvalidTarget { pattern: String, target: String },

    #[error("proxy rule `{0}` has a zero timeout")]
    ZeroTimeout(String),

    #[error("proxy rule `{pattern}` has invalid header `{name}`")]
    InvalidHeader { pattern: String, name: String },

    #[error("invalid CORS method `{0}`")]
    InvalidCorsMethod(String),

    #[error("CORS preflight status {0} is not a 2xx code")]
    InvalidPreflightStatus(u16),
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "metrics",
            value: config.observability.metrics_address.clone(),
        });
    }

    if !config.health.path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthPath(config.health.path.clone()));
    }

    for rule in &config.proxy.rules {
        if !rule.pattern.starts_with('/') {
            errors.push(ValidationError::InvalidPattern(rule.pattern.clone()));
        }

        if let Some(target) = &rule.target {
            let valid = Url::parse(target)
                .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
                .unwrap_or(false);
            if !valid {
                errors.push(ValidationError::InvalidTarget {
                    pattern: rule.pattern.clone(),
                    target: target.clone(),
                });
            }
        }

        if rule.timeout_ms == 0 {
            errors.push(ValidationError::ZeroTimeout(rule.pattern.clone()));
        }

        for (name, value) in &rule.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err()
                || HeaderValue::from_str(value).is_err()
            {
                errors.push(ValidationError::InvalidHeader {
                    pattern: rule.pattern.clone(),
                    name: name.clone(),
                });
            }
        }
    }

    for method in &config.cors.methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidCorsMethod(method.clone()));
        }
    }

    if !(200..=299).contains(&config.cors.options_success_status) {
        errors.push(ValidationError::InvalidPreflightStatus(
            config.cors.options_success_status,
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ProxyRuleConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_target_must_be_http_url() {
        let mut config = ServerConfig::default();
        let mut rule = ProxyRuleConfig::new("/api/*");
        rule.target = Some("localhost:3000".into());
        config.proxy.rules.push(rule);

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidTarget { .. }));
    }

    #[test]
    fn test_rule_without_target_is_valid() {
        let mut config = ServerConfig::default();
        config.proxy.rules.push(ProxyRuleConfig::new("/hooks/*"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_bad_header_and_cors_settings() {
        let mut config = ServerConfig::default();
        let mut rule = ProxyRuleConfig::new("/api/*");
        rule.headers.insert("bad header".into(), "x".into());
        config.proxy.rules.push(rule);
        config.cors.methods.push("GE T".into());
        config.cors.options_success_status = 404;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
