//! Structured logging.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and to `tower_http`'s request spans.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Call once, from the binary.
pub fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("bread_proxy={level},tower_http={level}"))
        .unwrap_or_else(|_| EnvFilter::new("bread_proxy=info,tower_http=info"))
}

