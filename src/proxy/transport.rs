//! Response body transport: stream through, or buffer and rewrite.
//!
//! Pass-through bodies are forwarded chunk by chunk as the upstream yields
//! them, so backpressure from the client reaches the upstream socket and
//! dropping the response (client gone) drops the upstream connection.
//! Rewritable bodies are drained fully, decoded lossily as UTF-8, rewritten
//! and sent with an exact `Content-Length`.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use futures_util::TryStreamExt;

use crate::observability::metrics;
use crate::proxy::error::UpstreamError;
use crate::rewrite::{RewriteContext, RewriterKind};

/// Relay the upstream body untouched.
pub fn stream_response(status: StatusCode, headers: HeaderMap, upstream: reqwest::Response) -> Response {
    let target = upstream.url().to_string();
    let stream = upstream.bytes_stream().inspect_err(move |e| {
        tracing::warn!(target = %target, error = %e, "Upstream body stream aborted");
    });
    build_response(status, headers, Body::from_stream(stream))
}

/// Buffer the upstream body, rewrite it and relay the result.
pub async fn rewrite_response(
    status: StatusCode,
    mut headers: HeaderMap,
    upstream: reqwest::Response,
    kind: RewriterKind,
    ctx: &RewriteContext,
    timeout_ms: u64,
) -> Result<Response, UpstreamError> {
    let raw = upstream
        .bytes()
        .await
        .map_err(|e| UpstreamError::from_reqwest(&e, timeout_ms))?;

    let rewritten = rewrite_body(&raw, kind, ctx);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
    metrics::record_rewrite(kind.as_str());
    tracing::debug!(
        kind = kind.as_str(),
        upstream_bytes = raw.len(),
        rewritten_bytes = rewritten.len(),
        "Body rewritten"
    );

    Ok(build_response(status, headers, Body::from(rewritten)))
}

/// Invalid UTF-8 becomes U+FFFD rather than failing the request.
pub fn rewrite_body(raw: &[u8], kind: RewriterKind, ctx: &RewriteContext) -> String {
    let text = String::from_utf8_lossy(raw);
    kind.rewrite(&text, ctx)
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::tests::context;

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let ctx = context("https://example.com/");
        let out = rewrite_body(b"a{b:url(x.png)} \xff\xfe", RewriterKind::Css, &ctx);
        assert!(out.contains('\u{FFFD}'));
        assert!(out.contains("http://proxy.test/go/https%3A%2F%2Fexample.com%2Fx.png"));
    }
}
