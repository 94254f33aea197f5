//! Proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (buffered)
//!     → matcher.rs (first enabled rule whose pattern fits the path)
//!     → executor.rs
//!         → verdict.rs (interception handler: proceed / block / skip)
//!         → resilience::retries (per-attempt timeout, bounded retries)
//!         → upstream response relayed, or 502
//! ```
//!
//! # Design Decisions
//! - Rules keep operator order; route-style specificity does not apply here
//! - Rules are compiled once and shared through `Arc`
//! - `Skip` hands the request back to local routing, not to later rules

pub mod executor;
pub mod matcher;
pub mod rule;
pub mod verdict;

pub use executor::{ProxyExecutor, ProxyOutcome, DEFAULT_MAX_RESPONSE_BYTES};
pub use matcher::{ProxyMatch, ProxyMatcher};
pub use rule::ProxyRule;
pub use verdict::{ProxyContext, ProxyHandler, ProxyVerdict};
