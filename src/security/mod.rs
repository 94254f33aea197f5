//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → cors.rs (preflight answered here, origin resolved)
//!     → headers.rs (forwarded requests lose hop-by-hop headers)
//!
//! Outbound response:
//!     → headers.rs (relayed upstream responses lose hop-by-hop headers)
//!     → cors.rs (allow-origin / credentials / expose headers injected)
//! ```

pub mod cors;
pub mod headers;

pub use cors::{AllowedOrigin, CorsEvaluator, CorsPolicy};
