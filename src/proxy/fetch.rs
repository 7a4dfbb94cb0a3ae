//! Upstream request construction and execution.
//!
//! Redirects are never followed here: the client is built with
//! `redirect::Policy::none()` so every 3xx comes back to the handler, which
//! re-encodes the `Location` through the proxy.

use std::time::Duration;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderValue, Method},
};
use url::Url;

use crate::proxy::browser_headers::browser_headers;
use crate::proxy::error::UpstreamError;
use crate::proxy::request::method_has_body;

/// Fully prepared upstream request.
#[derive(Debug, Clone)]
pub struct UpstreamOptions {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

/// Compose the outbound request from the validated target and the inbound
/// method/headers.
///
/// The inbound `Content-Type` is forwarded for write methods only; a body
/// without any content type is labelled `application/octet-stream`.
pub fn build_fetch_options(
    target: &Url,
    method: &Method,
    incoming: &HeaderMap,
    body: Option<Bytes>,
    timeout: Duration,
) -> UpstreamOptions {
    let mut headers = browser_headers(target);

    if method_has_body(method) {
        if let Some(content_type) = incoming.get(header::CONTENT_TYPE) {
            headers.insert(header::CONTENT_TYPE, content_type.clone());
        }
    }

    let body = body.filter(|b| !b.is_empty());
    if body.is_some() && !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
    }

    UpstreamOptions {
        method: method.clone(),
        url: target.clone(),
        headers,
        body,
        timeout,
    }
}

/// Shared HTTP client for upstream fetches. Cheap to clone.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    inner: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(use_system_proxy: bool) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        if !use_system_proxy {
            builder = builder.no_proxy();
        }
        Ok(Self {
            inner: builder.build()?,
        })
    }

    /// Issue a single attempt. The deadline covers the whole exchange,
    /// including the body; on expiry the connection is dropped.
    pub async fn send(&self, options: UpstreamOptions) -> Result<reqwest::Response, UpstreamError> {
        let timeout_ms = options.timeout.as_millis() as u64;
        let mut request = self
            .inner
            .request(options.method, options.url)
            .headers(options.headers)
            .timeout(options.timeout);
        if let Some(body) = options.body {
            request = request.body(body);
        }
        request
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(&e, timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Url {
        Url::parse("https://example.com/form").unwrap()
    }

    fn incoming_json() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=secret"));
        headers
    }

    #[test]
    fn get_ignores_inbound_headers() {
        let options = build_fetch_options(
            &target(),
            &Method::GET,
            &incoming_json(),
            None,
            Duration::from_secs(30),
        );
        assert_eq!(options.method, Method::GET);
        assert!(!options.headers.contains_key(header::CONTENT_TYPE));
        assert!(!options.headers.contains_key(header::COOKIE));
        assert!(options.body.is_none());
    }

    #[test]
    fn post_forwards_content_type() {
        let options = build_fetch_options(
            &target(),
            &Method::POST,
            &incoming_json(),
            Some(Bytes::from_static(b"{}")),
            Duration::from_secs(30),
        );
        assert_eq!(options.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(options.body.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn untyped_body_defaults_to_octet_stream() {
        let options = build_fetch_options(
            &target(),
            &Method::PUT,
            &HeaderMap::new(),
            Some(Bytes::from_static(b"raw")),
            Duration::from_millis(500),
        );
        assert_eq!(options.headers[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(options.timeout, Duration::from_millis(500));
    }

    #[test]
    fn empty_body_is_dropped() {
        let options = build_fetch_options(
            &target(),
            &Method::POST,
            &HeaderMap::new(),
            Some(Bytes::new()),
            Duration::from_secs(1),
        );
        assert!(options.body.is_none());
        assert!(!options.headers.contains_key(header::CONTENT_TYPE));
    }
}
