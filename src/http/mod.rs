//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request-id + trace layers)
//!     → request.rs (buffer body, expose InboundRequest)
//!     → dispatch (CORS → proxy → local routes)
//!     → response.rs (structured error bodies)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{InboundRequest, MakeRequestUuid, X_REQUEST_ID};
pub use response::{error_response, ErrorBody};
pub use server::HttpServer;
