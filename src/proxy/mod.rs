//! Rewriting proxy core.
//!
//! # Data Flow
//! ```text
//! <mount>/<percent-encoded-url>
//!     → request.rs (parse path, validate scheme, read body)
//!     → fetch.rs + browser_headers.rs (browser-like upstream request, no redirects)
//!     → response.rs (strip hop-by-hop/blocking headers, re-encode Location, CORS)
//!     → content_type.rs (pick rewriter or none)
//!     → transport.rs (stream through, or buffer + rewrite + Content-Length)
//! ```
//!
//! # Design Decisions
//! - One upstream attempt per client request; no retries at this layer
//! - Redirects are intercepted so every hop is re-validated and re-encoded
//! - Only the browser-identity headers reach the upstream; client cookies
//!   and credentials are never forwarded
//! - Binary payloads are never decoded

pub mod browser_headers;
pub mod codec;
pub mod content_type;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod request;
pub mod response;
pub mod transport;

pub use codec::UrlCodec;
pub use error::{ParseError, ProxyError, UpstreamError};
pub use handler::proxy_handler;
