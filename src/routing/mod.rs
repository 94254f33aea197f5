//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     RouteRegistration { tokens, methods }
//!     → pattern.rs (tokens → Segment sequence + specificity)
//!     → table.rs (merge same-shape patterns, keep sorted by specificity)
//!     → Freeze as immutable RouteTable
//!
//! Incoming Request (path):
//!     → table.rs (linear scan in specificity order)
//!     → segment.rs (component-by-component match)
//!     → Return: RouteMatch { entry, params } or NotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex: pre-compiled segments and a small linear matcher
//! - Deterministic: same path always resolves to the same pattern
//! - Most specific match wins; registration order breaks ties
//! - Patterns differing only in parameter names conflict

pub mod handler;
pub mod pattern;
pub mod segment;
pub mod table;

pub use handler::{
    HandlerResult, InputValidator, MethodRoute, Payload, QueryValue, RequestContext, RouteHandler,
    RouteMetadata, ValidationFailure,
};
pub use pattern::{RoutePattern, Specificity};
pub use segment::Segment;
pub use table::{Resolution, RouteEntry, RouteInfo, RouteMatch, RouteRegistration, RouteTable};
