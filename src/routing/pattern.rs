//! Route pattern compilation.
//!
//! Tokens come from the file-system naming convention, one per directory
//! level: `[id]` is a dynamic segment, `[...rest]` a catch-all,
//! `[[...rest]]` an optional catch-all, anything else is literal.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;

use crate::error::PatternError;
use crate::routing::segment::{match_segments, render, split_path, Segment, SegmentKind};

/// Ordering key for route resolution; the smaller key is more specific.
///
/// Segment kinds are compared position by position, so a literal beats a
/// dynamic segment at the same depth, which beats a catch-all. Registration
/// order breaks any remaining tie and is applied by the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specificity {
    kinds: Vec<SegmentKind>,
}

impl Specificity {
    fn of(segments: &[Segment]) -> Self {
        Self {
            kinds: segments.iter().map(Segment::kind).collect(),
        }
    }

    pub fn is_static(&self) -> bool {
        self.kinds.iter().all(|kind| *kind == SegmentKind::Static)
    }
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kinds.cmp(&other.kinds)
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    segments: Vec<Segment>,
    specificity: Specificity,
}

impl RoutePattern {
    /// Compile an ordered token list. An empty list is the root route.
    pub fn compile<S: AsRef<str>>(tokens: &[S]) -> Result<Self, PatternError> {
        let segments = tokens
            .iter()
            .map(|token| compile_token(token.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        for (position, segment) in segments.iter().enumerate() {
            if let Segment::CatchAll { name, .. } = segment {
                if position + 1 != segments.len() {
                    return Err(PatternError::CatchAllNotLast { name: name.clone() });
                }
            }
            if let Some(name) = segment.param_name() {
                if !seen.insert(name.clone()) {
                    return Err(PatternError::DuplicateParam(name));
                }
            }
        }

        let specificity = Specificity::of(&segments);
        Ok(Self {
            segments,
            specificity,
        })
    }

    /// Compile a slash-separated path such as `/users/[id]`.
    pub fn parse(path: &str) -> Result<Self, PatternError> {
        let tokens = split_path(path);
        Self::compile(&tokens)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn specificity(&self) -> &Specificity {
        &self.specificity
    }

    /// Whether both patterns match exactly the same paths: identical kinds
    /// and literals, parameter names ignored.
    pub fn same_shape(&self, other: &RoutePattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Static(a), Segment::Static(b)) => a == b,
                    _ => a.kind() == b.kind(),
                })
    }

    pub fn param_names(&self) -> impl Iterator<Item = String> + '_ {
        self.segments.iter().filter_map(Segment::param_name)
    }

    /// Match a concrete path, binding parameters by name.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let components = split_path(path);
        let values = match_segments(&self.segments, &components)?;
        Some(self.param_names().zip(values).collect())
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.segments))
    }
}

fn compile_token(token: &str) -> Result<Segment, PatternError> {
    if let Some(inner) = token.strip_prefix("[[").and_then(|t| t.strip_suffix("]]")) {
        let name = inner
            .strip_prefix("...")
            .ok_or_else(|| PatternError::MalformedToken(token.to_string()))?;
        return Ok(Segment::CatchAll {
            name: param_name(name, token)?,
            optional: true,
        });
    }

    if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        return match inner.strip_prefix("...") {
            Some(name) => Ok(Segment::CatchAll {
                name: param_name(name, token)?,
                optional: false,
            }),
            None => Ok(Segment::Dynamic(param_name(inner, token)?)),
        };
    }

    if token.is_empty() || token.contains(['[', ']', '/']) {
        return Err(PatternError::MalformedToken(token.to_string()));
    }

    Ok(Segment::Static(token.to_string()))
}

fn param_name(name: &str, token: &str) -> Result<String, PatternError> {
    if name.is_empty() {
        return Err(PatternError::EmptyParamName(token.to_string()));
    }
    if name.contains(['[', ']', '/', '.']) {
        return Err(PatternError::MalformedToken(token.to_string()));
    }
    Ok(name.to_string())
}
