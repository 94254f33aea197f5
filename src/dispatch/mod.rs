//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! axum fallback handler
//!     → dispatcher.rs
//!         → health path?            → 200
//!         → CORS preflight?         → security::cors
//!         → buffer body (limit)     → 413 on overflow
//!         → proxy rule matched?     → proxy::executor (skip falls through)
//!         → route table             → handler / 404 / 405
//!         → CORS headers injected
//! ```
//!
//! # Design Decisions
//! - Built once by `DispatcherBuilder`, immutable while serving
//! - Stage order is fixed and total for every request

pub mod builder;
pub mod dispatcher;

pub use builder::DispatcherBuilder;
pub use dispatcher::{Dispatcher, Stage};
