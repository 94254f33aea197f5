//! Convention-based HTTP routing and dispatch engine.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (axum fallback, request id, trace)
//!                          │
//!                          ▼
//!                     dispatch::Dispatcher
//!                          │
//!        ┌─────────────────┼───────────────────┬───────────────────┐
//!        ▼                 ▼                   ▼                   ▼
//!   health path     security::cors       proxy::matcher      routing::table
//!                    (preflight)               │            (specificity order)
//!                                              ▼                   │
//!                                       proxy::executor            ▼
//!                                   (verdict, retries, relay)   handler
//!                                              │                   │
//!                                              └─────────┬─────────┘
//!                                                        ▼
//!                                         security::cors (response headers)
//! ```
//!
//! Route tables and proxy rules are built once by
//! [`DispatcherBuilder`](dispatch::DispatcherBuilder) and shared read-only
//! across request tasks.

// Core subsystems
pub mod dispatch;
pub mod http;
pub mod proxy;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::ServerConfig;
pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use error::{BoxError, DispatchError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::{ProxyContext, ProxyRule, ProxyVerdict};
pub use routing::{MethodRoute, RequestContext, RouteRegistration, RouteTable};
pub use security::CorsPolicy;
