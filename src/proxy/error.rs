//! Error taxonomy for a single proxied transaction.
//!
//! Client-input defects map to 400, transport failures to 502. Upstream
//! non-2xx statuses are not errors at all; they are relayed as-is.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Defects in the target URL carried by the proxy path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Missing target URL")]
    MissingTargetUrl,

    #[error("Invalid target URL encoding")]
    InvalidEncoding,

    #[error("Invalid target URL scheme")]
    InvalidScheme,

    #[error("Invalid URL")]
    InvalidUrl,
}

impl ParseError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::MissingTargetUrl => "missing_target_url",
            ParseError::InvalidEncoding => "invalid_encoding",
            ParseError::InvalidScheme => "invalid_scheme",
            ParseError::InvalidUrl => "invalid_url",
        }
    }
}

/// Failure to obtain a response (or a buffered body) from the target.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream timed out after {0} ms")]
    Timeout(u64),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

impl UpstreamError {
    /// Classify a reqwest failure, keeping the full cause chain in the text.
    pub fn from_reqwest(err: &reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(timeout_ms)
        } else if err.is_connect() {
            UpstreamError::Connect(error_chain(err))
        } else {
            UpstreamError::Other(error_chain(err))
        }
    }

    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Connect(_) => "connect",
            UpstreamError::Other(_) => "other",
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

/// Everything that can short-circuit the proxy state machine.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Error reading request body")]
    BodyRead,

    #[error("Gateway error: {0}")]
    Upstream(#[from] UpstreamError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Parse(_) | ProxyError::BodyRead => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
