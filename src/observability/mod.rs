//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! proxy / security / status
//!     → logging.rs (structured tracing events, request spans from tower-http)
//!     → metrics.rs (counters and histograms behind the `metrics` facade)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! # Design Decisions
//! - Request ID (`x-request-id`) is attached to every proxy log line
//! - Metric updates are cheap and safe to call without an exporter

pub mod logging;
pub mod metrics;
