//! Reversible mapping between absolute target URLs and proxy paths.
//!
//! A proxied URL looks like `<proxy base><mount>/<percent-encoded target>`,
//! e.g. `https://proxy.example/go/https%3A%2F%2Fexample.com%2F`.

use std::sync::Arc;

use axum::http::{header, HeaderMap, Uri};

/// Encodes target URLs into proxy paths under a fixed mount point.
#[derive(Debug, Clone)]
pub struct UrlCodec {
    mount_path: Arc<str>,
}

impl UrlCodec {
    pub fn new(mount_path: impl Into<String>) -> Self {
        Self {
            mount_path: Arc::from(mount_path.into()),
        }
    }

    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    /// `<mount>/` followed by the percent-encoding of `absolute_url`.
    ///
    /// Everything outside `A-Z a-z 0-9 - . _ ~` is escaped, so the result is
    /// always a single path segment. That is stricter than JavaScript's
    /// `encodeURIComponent`, which leaves `!'()*` alone; [`decode`] accepts
    /// either form.
    pub fn encode(&self, absolute_url: &str) -> String {
        format!("{}/{}", self.mount_path, urlencoding::encode(absolute_url))
    }

    /// Full proxied link: `proxy_base` followed by [`encode`](Self::encode).
    pub fn proxied_url(&self, proxy_base: &str, absolute_url: &str) -> String {
        format!("{}{}", proxy_base, self.encode(absolute_url))
    }

    /// Whether `absolute_url` already points back at this proxy's mount.
    pub fn is_proxied(&self, proxy_base: &str, absolute_url: &str) -> bool {
        absolute_url
            .strip_prefix(proxy_base)
            .and_then(|rest| rest.strip_prefix(&*self.mount_path))
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Percent-decode a path segment back into a target URL.
///
/// Returns `None` for malformed escapes (`%` not followed by two hex digits)
/// or bytes that do not form UTF-8. Bare hosts such as `example.com/a` get
/// `https://` prepended; strings carrying some other explicit scheme are
/// returned unchanged so that scheme validation can reject them.
pub fn decode(segment: &str) -> Option<String> {
    if !has_well_formed_escapes(segment) {
        return None;
    }
    let raw = urlencoding::decode(segment).ok()?.into_owned();
    if has_http_scheme(&raw) || has_foreign_scheme(&raw) {
        Some(raw)
    } else {
        Some(format!("https://{raw}"))
    }
}

/// Case-insensitive `http://` / `https://` prefix check.
pub fn has_http_scheme(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn has_well_formed_escapes(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3);
            if !hex.is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit)) {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// `ftp://x`, `file:///etc`, `javascript:alert(1)` carry a scheme;
/// `example.com:8080/x` and `localhost:3000` are host:port.
fn has_foreign_scheme(value: &str) -> bool {
    let Some((scheme, rest)) = value.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return false;
    }
    if rest.starts_with("//") {
        return true;
    }
    !scheme.contains('.') && !rest.starts_with(|c: char| c.is_ascii_digit())
}

/// `scheme://host` the client used to reach the proxy.
///
/// Prefers `X-Forwarded-Proto` / `X-Forwarded-Host` (first value when a
/// chain of proxies appended several), then `Host`, then the request-target
/// authority (HTTP/2), then `localhost`.
pub fn resolve_proxy_base(headers: &HeaderMap, uri: &Uri, default_scheme: &str) -> String {
    let proto = first_forwarded(headers, "x-forwarded-proto").unwrap_or(default_scheme);
    let host = first_forwarded(headers, "x-forwarded-host")
        .or_else(|| headers.get(header::HOST).and_then(|v| v.to_str().ok()))
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");
    format!("{proto}://{host}")
}

fn first_forwarded<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
