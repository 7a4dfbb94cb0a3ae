//! Inbound proxy request parsing and validation.

use axum::{
    body::{Body, Bytes},
    http::Method,
};
use url::Url;

use crate::proxy::codec::{self, has_http_scheme};
use crate::proxy::error::{ParseError, ProxyError};

/// Target extracted from `<mount>/<encoded>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    /// Decoded absolute target URL.
    pub target_url: String,
    /// The raw encoded segment it came from.
    pub encoded_path: String,
}

/// Parse the path remaining after the mount prefix.
///
/// Leading slashes are stripped and only the first segment is considered;
/// anything after a literal `/` belongs to nobody.
pub fn parse_proxy_path(path: &str) -> Result<ParsedTarget, ParseError> {
    let segment = path.trim_start_matches('/').split('/').next().unwrap_or_default();
    if segment.is_empty() {
        return Err(ParseError::MissingTargetUrl);
    }

    let target_url = codec::decode(segment).ok_or(ParseError::InvalidEncoding)?;
    if !has_http_scheme(&target_url) {
        return Err(ParseError::InvalidScheme);
    }

    Ok(ParsedTarget {
        target_url,
        encoded_path: segment.to_string(),
    })
}

/// Re-parse the target and refuse anything that is not `http:`/`https:`.
///
/// No request reaches the fetch builder without passing through here.
pub fn validate_target_url(url: &str) -> Result<Url, ParseError> {
    let parsed = Url::parse(url).map_err(|_| ParseError::InvalidUrl)?;
    if matches!(parsed.scheme(), "http" | "https") {
        Ok(parsed)
    } else {
        Err(ParseError::InvalidScheme)
    }
}

/// Only write methods carry a body worth forwarding.
pub fn method_has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Drain the inbound body, bounded by `limit` bytes.
pub async fn read_request_body(body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        tracing::warn!(error = %e, limit, "Failed to read request body");
        ProxyError::BodyRead
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_segment() {
        let parsed = parse_proxy_path("/https%3A%2F%2Fexample.com%2F/ignored").unwrap();
        assert_eq!(parsed.target_url, "https://example.com/");
        assert_eq!(parsed.encoded_path, "https%3A%2F%2Fexample.com%2F");
    }

    #[test]
    fn strips_repeated_leading_slashes() {
        let parsed = parse_proxy_path("///example.com").unwrap();
        assert_eq!(parsed.target_url, "https://example.com");
    }

    #[test]
    fn missing_segment() {
        assert_eq!(parse_proxy_path(""), Err(ParseError::MissingTargetUrl));
        assert_eq!(parse_proxy_path("/"), Err(ParseError::MissingTargetUrl));
    }

    #[test]
    fn bad_encoding() {
        assert_eq!(parse_proxy_path("/https%3A%2F%2Fa.com%"), Err(ParseError::InvalidEncoding));
    }

    #[test]
    fn non_http_schemes_are_rejected_by_both_checks() {
        for raw in ["ftp://host/file", "file:///etc/passwd", "javascript:alert(1)"] {
            let segment = urlencoding::encode(raw);
            assert_eq!(
                parse_proxy_path(&format!("/{segment}")),
                Err(ParseError::InvalidScheme),
                "{raw}"
            );
            assert_eq!(validate_target_url(raw).unwrap_err(), ParseError::InvalidScheme, "{raw}");
        }
    }

    #[test]
    fn validate_accepts_http_and_https() {
        assert_eq!(validate_target_url("HTTPS://Example.com/x").unwrap().as_str(), "https://example.com/x");
        assert!(validate_target_url("http://127.0.0.1:8080").is_ok());
        assert_eq!(validate_target_url("https://"), Err(ParseError::InvalidUrl));
    }

    #[test]
    fn only_write_methods_read_bodies() {
        assert!(method_has_body(&Method::POST));
        assert!(method_has_body(&Method::PATCH));
        assert!(!method_has_body(&Method::GET));
        assert!(!method_has_body(&Method::DELETE));
    }

    #[tokio::test]
    async fn reads_empty_and_bounded_bodies() {
        assert!(read_request_body(Body::empty(), 16).await.unwrap().is_empty());
        assert_eq!(&read_request_body(Body::from("hello"), 16).await.unwrap()[..], b"hello");
        assert!(matches!(
            read_request_body(Body::from(vec![0u8; 32]), 16).await,
            Err(ProxyError::BodyRead)
        ));
    }
}
