//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID + trace layers)
//!     → request.rs (request ID generation and lookup)
//!     → access gate (proxy routes only)
//!     → proxy::handler (fetch, rewrite or stream)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
