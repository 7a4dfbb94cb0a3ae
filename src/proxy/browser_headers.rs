//! Browser-identity headers for upstream fetches.
//!
//! Many sites answer 403 to anything that does not look like a desktop
//! browser navigation, so every upstream request carries the same Chrome
//! fingerprint plus `Host`/`Origin`/`Referer` derived from the target.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use url::Url;

pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const STATIC_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.9"),
    // Bodies are relayed or rewritten as received; never ask for compression.
    ("accept-encoding", "identity"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    (
        "sec-ch-ua",
        "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("upgrade-insecure-requests", "1"),
    ("user-agent", CHROME_USER_AGENT),
];

/// Build the full browser-identity header set for `target`.
pub fn browser_headers(target: &Url) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(STATIC_HEADERS.len() + 3);
    for &(name, value) in STATIC_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    let origin = target.origin().ascii_serialization();
    let host = match (target.host_str(), target.port()) {
        (Some(host), Some(port)) => Some(format!("{host}:{port}")),
        (Some(host), None) => Some(host.to_string()),
        _ => None,
    };

    if let Some(value) = host.and_then(|h| HeaderValue::from_str(&h).ok()) {
        headers.insert(header::HOST, value);
    }
    if let Ok(value) = HeaderValue::from_str(&origin) {
        headers.insert(header::ORIGIN, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{origin}/")) {
        headers.insert(header::REFERER, value);
    }
    headers
}
