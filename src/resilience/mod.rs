//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarding attempt to upstream:
//!     → retries.rs (per-attempt deadline, bounded attempt count)
//!     → On failure: backoff.rs (delay before the next attempt, 0 by default)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every outbound call has a deadline
//! - Only transport failures and timeouts are retried, never handler errors
//! - Upstream HTTP error statuses are responses, not failures

pub mod backoff;
pub mod retries;

pub use retries::{AttemptError, RetryPolicy};
