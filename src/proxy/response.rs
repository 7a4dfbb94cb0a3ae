//! Upstream response header processing.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers and headers that block embedding
//! - Inject CORS headers so proxied pages can fetch cross-origin
//! - Re-encode `Location` on redirects so the client stays on the proxy

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use url::Url;

use crate::proxy::codec::UrlCodec;

/// Meaningful for a single transport leg only.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Block framing, or no longer describe the body once it may be rewritten.
const STRIPPED: &[&str] = &[
    "x-frame-options",
    "content-security-policy",
    "content-encoding",
    "content-length",
];

/// Copy upstream headers minus hop-by-hop and embedding blockers.
/// Multi-valued headers such as `set-cookie` keep every value.
pub fn sanitize_upstream_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name_str = name.as_str();
        if HOP_BY_HOP.contains(&name_str) || STRIPPED.contains(&name_str) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// CORS headers set on every proxy response.
pub fn proxy_response_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(2);
    let origin = incoming
        .get(header::ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));
    out.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    out.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("*"),
    );
    out
}

pub fn is_redirect(status: StatusCode) -> bool {
    status.is_redirection()
}

/// Resolve `location` against the current target and point it back through
/// the proxy. `None` means "leave the header as the upstream sent it":
/// empty, unparseable and non-http(s) locations pass through untouched.
pub fn rewrite_redirect_location(
    location: &str,
    target: &Url,
    proxy_base: &str,
    codec: &UrlCodec,
) -> Option<String> {
    let location = location.trim();
    if location.is_empty() {
        return None;
    }
    let absolute = target.join(location).ok()?;
    if !matches!(absolute.scheme(), "http" | "https") {
        return None;
    }
    Some(codec.proxied_url(proxy_base, absolute.as_str()))
}

/// Rewrite the `location` entry of `headers` in place when the status is 3xx.
pub fn apply_redirect_rewrite(
    status: StatusCode,
    headers: &mut HeaderMap,
    target: &Url,
    proxy_base: &str,
    codec: &UrlCodec,
) {
    if !is_redirect(status) {
        return;
    }
    let rewritten = headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|loc| rewrite_redirect_location(loc, target, proxy_base, codec))
        .and_then(|loc| HeaderValue::from_str(&loc).ok());
    if let Some(value) = rewritten {
        headers.insert(header::LOCATION, value);
    }
}
