//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled patterns with their per-method handlers
//! - Resolve a concrete path to a pattern and bound parameters
//! - Enumerate routes for documentation collaborators
//!
//! # Design Decisions
//! - Entries are kept sorted by specificity, then registration order
//! - Patterns that match the same paths share one entry; each method keeps
//!   the parameter names it was registered with
//! - Resolution ignores the method; the caller distinguishes 404 from 405
//! - Built once at startup and read-only afterwards (no locks needed)

use std::collections::{BTreeMap, HashMap};

use axum::http::Method;
use serde::Serialize;

use crate::error::{ConflictError, RouteError};
use crate::routing::handler::{MethodRoute, RouteMetadata};
use crate::routing::pattern::RoutePattern;
use crate::routing::segment::{match_segments, split_path};

/// One pattern and the handlers registered for it.
#[derive(Debug)]
pub struct RouteEntry {
    pattern: RoutePattern,
    methods: HashMap<Method, MethodRoute>,
    bindings: HashMap<Method, Vec<String>>,
    order: usize,
}

impl RouteEntry {
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn method(&self, method: &Method) -> Option<&MethodRoute> {
        self.methods.get(method)
    }

    fn insert(
        &mut self,
        pattern: &RoutePattern,
        method: Method,
        route: MethodRoute,
    ) -> Option<MethodRoute> {
        self.bindings
            .insert(method.clone(), pattern.param_names().collect());
        self.methods.insert(method, route)
    }

    /// Registered methods, sorted by name.
    pub fn allowed_methods(&self) -> Vec<Method> {
        let mut methods: Vec<Method> = self.methods.keys().cloned().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }
}

/// A successful path resolution. `params` uses the entry pattern's names.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub entry: &'a RouteEntry,
    pub params: HashMap<String, String>,
    values: Vec<String>,
}

impl RouteMatch<'_> {
    /// Parameters bound under the names `method` was registered with.
    pub fn params_for(&self, method: &Method) -> HashMap<String, String> {
        match self.entry.bindings.get(method) {
            Some(names) => names.iter().cloned().zip(self.values.iter().cloned()).collect(),
            None => self.params.clone(),
        }
    }
}

/// Outcome of [`RouteTable::resolve`].
#[derive(Debug)]
pub enum Resolution<'a> {
    Matched(RouteMatch<'a>),
    NotFound,
}

impl<'a> Resolution<'a> {
    pub fn matched(self) -> Option<RouteMatch<'a>> {
        match self {
            Resolution::Matched(m) => Some(m),
            Resolution::NotFound => None,
        }
    }
}

/// Serialisable description of a route, as returned by `list_routes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteInfo {
    pub pattern: String,
    pub methods: Vec<String>,
    pub metadata: BTreeMap<String, RouteMetadata>,
}

/// Input from the route discovery collaborator: one path's tokens and the
/// handlers for each of its methods.
#[derive(Debug)]
pub struct RouteRegistration {
    pub tokens: Vec<String>,
    pub methods: Vec<(Method, MethodRoute)>,
}

impl RouteRegistration {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            methods: Vec::new(),
        }
    }

    pub fn on(mut self, method: Method, route: MethodRoute) -> Self {
        self.methods.push((method, route));
        self
    }
}

/// The compiled route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    next_order: usize,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register every entry. Malformed patterns are skipped and
    /// conflicting methods are overwritten (last registration wins); both are
    /// logged and reported, neither aborts the build.
    pub fn from_registrations<I>(registrations: I) -> (Self, Vec<RouteError>)
    where
        I: IntoIterator<Item = RouteRegistration>,
    {
        let mut table = Self::new();
        let mut errors = Vec::new();

        for registration in registrations {
            let pattern = match RoutePattern::compile(&registration.tokens) {
                Ok(pattern) => pattern,
                Err(source) => {
                    tracing::error!(
                        tokens = ?registration.tokens,
                        error = %source,
                        "Skipping route with invalid pattern"
                    );
                    errors.push(RouteError::Pattern {
                        tokens: registration.tokens,
                        source,
                    });
                    continue;
                }
            };

            for (method, route) in registration.methods {
                if let Err(conflict) = table.register(pattern.clone(), method.clone(), route.clone())
                {
                    tracing::warn!(
                        pattern = %pattern,
                        method = %method,
                        "Route conflict, last registration wins"
                    );
                    table.replace(pattern.clone(), method, route);
                    errors.push(conflict.into());
                }
            }
        }

        (table, errors)
    }

    /// Register a handler. Fails if a pattern matching the same paths already
    /// has one for `method`, whatever its parameter names; the table is left
    /// unchanged in that case.
    pub fn register(
        &mut self,
        pattern: RoutePattern,
        method: Method,
        route: MethodRoute,
    ) -> Result<(), ConflictError> {
        if let Some(entry) = self.entry_mut(&pattern) {
            if entry.methods.contains_key(&method) {
                return Err(ConflictError {
                    pattern: pattern.to_string(),
                    method,
                });
            }
            entry.insert(&pattern, method, route);
            return Ok(());
        }

        self.push_entry(pattern, method, route);
        Ok(())
    }

    /// Register a handler, overwriting any existing one. Returns the
    /// previous handler for that pattern and method.
    pub fn replace(
        &mut self,
        pattern: RoutePattern,
        method: Method,
        route: MethodRoute,
    ) -> Option<MethodRoute> {
        if let Some(entry) = self.entry_mut(&pattern) {
            return entry.insert(&pattern, method, route);
        }
        self.push_entry(pattern, method, route);
        None
    }

    /// Resolve a concrete path (without query string).
    pub fn resolve(&self, path: &str) -> Resolution<'_> {
        let components = split_path(path);

        for entry in &self.entries {
            if let Some(values) = match_segments(entry.pattern.segments(), &components) {
                let params = entry.pattern.param_names().zip(values.clone()).collect();
                return Resolution::Matched(RouteMatch {
                    entry,
                    params,
                    values,
                });
            }
        }
        Resolution::NotFound
    }

    /// Routes in resolution order, for documentation and validation collaborators.
    pub fn list_routes(&self) -> Vec<RouteInfo> {
        self.entries
            .iter()
            .map(|entry| {
                let methods = entry.allowed_methods();
                RouteInfo {
                    pattern: entry.pattern.to_string(),
                    metadata: methods
                        .iter()
                        .filter_map(|method| {
                            entry
                                .methods
                                .get(method)
                                .map(|route| (method.to_string(), route.metadata().clone()))
                        })
                        .collect(),
                    methods: methods.iter().map(Method::to_string).collect(),
                }
            })
            .collect()
    }

    /// Iterate entries in resolution order.
    pub fn entries(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, pattern: &RoutePattern) -> Option<&mut RouteEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.pattern.same_shape(pattern))
    }

    fn push_entry(&mut self, pattern: RoutePattern, method: Method, route: MethodRoute) {
        let mut entry = RouteEntry {
            pattern,
            methods: HashMap::new(),
            bindings: HashMap::new(),
            order: self.next_order,
        };
        let pattern = entry.pattern.clone();
        entry.insert(&pattern, method, route);
        self.entries.push(entry);
        self.next_order += 1;
        self.entries.sort_by(|a, b| {
            a.pattern
                .specificity()
                .cmp(b.pattern.specificity())
                .then_with(|| a.order.cmp(&b.order))
        });
    }
}
