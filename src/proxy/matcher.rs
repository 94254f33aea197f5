//! First-match proxy rule lookup.
//!
//! Rules are evaluated in the order they were given; there is no
//! specificity reordering. Disabled rules never match.

use std::collections::HashMap;
use std::sync::Arc;

use crate::proxy::rule::{param_map, ProxyRule};

/// A rule that matched a request path, with its wildcard captures.
#[derive(Debug, Clone)]
pub struct ProxyMatch {
    pub rule: Arc<ProxyRule>,
    pub params: Vec<String>,
}

impl ProxyMatch {
    /// Captures keyed `param0..paramN`.
    pub fn param_map(&self) -> HashMap<String, String> {
        param_map(self.params.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProxyMatcher {
    rules: Vec<Arc<ProxyRule>>,
}

impl ProxyMatcher {
    pub fn new(rules: Vec<ProxyRule>) -> Self {
        Self {
            rules: rules.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn find(&self, path: &str) -> Option<ProxyMatch> {
        self.rules
            .iter()
            .filter(|rule| rule.is_enabled())
            .find_map(|rule| {
                rule.match_path(path).map(|params| ProxyMatch {
                    rule: Arc::clone(rule),
                    params,
                })
            })
    }

    pub fn rules(&self) -> &[Arc<ProxyRule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
