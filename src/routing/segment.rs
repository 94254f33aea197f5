//! Pre-compiled path segments and the linear matcher shared by route and
//! proxy patterns.

use std::fmt;

/// One compiled component of a route or proxy pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Literal component, compared case-sensitively.
    Static(String),
    /// Exactly one non-empty component, bound to `name`.
    Dynamic(String),
    /// All remaining components joined with `/`. Optional catch-alls also
    /// match zero components and bind the empty string.
    CatchAll { name: String, optional: bool },
    /// Proxy `*`, bound to `param{index}`. A trailing wildcard swallows the
    /// remainder of the path like a required catch-all.
    Wildcard { index: usize, trailing: bool },
}

/// Ordering class of a segment; earlier variants are more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SegmentKind {
    Static,
    Dynamic,
    CatchAll,
    OptionalCatchAll,
    Wildcard,
}

impl Segment {
    pub fn kind(&self) -> SegmentKind {
        match self {
            Segment::Static(_) => SegmentKind::Static,
            Segment::Dynamic(_) => SegmentKind::Dynamic,
            Segment::CatchAll { optional: false, .. } => SegmentKind::CatchAll,
            Segment::CatchAll { optional: true, .. } => SegmentKind::OptionalCatchAll,
            Segment::Wildcard { .. } => SegmentKind::Wildcard,
        }
    }

    /// Name this segment binds, if any.
    pub fn param_name(&self) -> Option<String> {
        match self {
            Segment::Static(_) => None,
            Segment::Dynamic(name) | Segment::CatchAll { name, .. } => Some(name.clone()),
            Segment::Wildcard { index, .. } => Some(format!("param{index}")),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Static(name) => f.write_str(name),
            Segment::Dynamic(name) => write!(f, "[{name}]"),
            Segment::CatchAll {
                name,
                optional: false,
            } => write!(f, "[...{name}]"),
            Segment::CatchAll {
                name,
                optional: true,
            } => write!(f, "[[...{name}]]"),
            Segment::Wildcard { .. } => f.write_str("*"),
        }
    }
}

/// Render segments back into a `/`-joined pattern string.
pub fn render(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    segments.iter().fold(String::new(), |mut out, segment| {
        out.push('/');
        out.push_str(&segment.to_string());
        out
    })
}

/// Split a concrete path into components. Trailing slashes are ignored and
/// the root path yields no components.
pub fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_end_matches('/');
    let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Match `components` against `segments`, returning the bound values in
/// segment order, or `None` when the path does not fit.
pub fn match_segments(segments: &[Segment], components: &[&str]) -> Option<Vec<String>> {
    let mut values = Vec::new();
    let mut rest = components;

    for segment in segments {
        match segment {
            Segment::Static(name) => {
                let (first, tail) = rest.split_first()?;
                if *first != name.as_str() {
                    return None;
                }
                rest = tail;
            }
            Segment::Dynamic(_) | Segment::Wildcard { trailing: false, .. } => {
                let (first, tail) = rest.split_first()?;
                if first.is_empty() {
                    return None;
                }
                values.push((*first).to_string());
                rest = tail;
            }
            Segment::CatchAll { optional, .. } => {
                if rest.is_empty() && !optional {
                    return None;
                }
                values.push(rest.join("/"));
                rest = &[];
            }
            Segment::Wildcard { trailing: true, .. } => {
                match rest.first() {
                    Some(first) if !first.is_empty() => {}
                    _ => return None,
                }
                values.push(rest.join("/"));
                rest = &[];
            }
        }
    }

    rest.is_empty().then_some(values)
}
