//! The proxy transaction: one inbound request, one upstream attempt.
//!
//! ```text
//! ParsingPath → ValidatingUrl → ReadingBody (write methods)
//!     → Fetching → ProcessingHeaders → Dispatching
//!     → Streaming | BufferRewriting
//! ```
//!
//! HEAD requests always take the streaming branch.
//!
//! Any failure short-circuits to a plain-text 400/502 via [`ProxyError`].

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use url::Url;

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::codec::resolve_proxy_base;
use crate::proxy::content_type::select_rewriter;
use crate::proxy::error::ProxyError;
use crate::proxy::fetch::build_fetch_options;
use crate::proxy::request::{method_has_body, parse_proxy_path, read_request_body, validate_target_url};
use crate::proxy::response::{apply_redirect_rewrite, proxy_response_headers, sanitize_upstream_headers};
use crate::proxy::transport::{rewrite_response, stream_response};
use crate::rewrite::RewriteContext;

/// Axum entry point for `<mount>`, `<mount>/` and `<mount>/{*target}`.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let request_id = request_id(request.headers());
    let cors = proxy_response_headers(request.headers());

    let response = match proxy_request(&state, request, &request_id).await {
        Ok(response) => response,
        Err(e) => {
            match &e {
                ProxyError::Upstream(upstream) => {
                    metrics::record_upstream_error(upstream.kind());
                    tracing::warn!(request_id = %request_id, kind = upstream.kind(), error = %upstream, "Upstream request failed");
                }
                ProxyError::Parse(parse) => {
                    tracing::debug!(request_id = %request_id, code = parse.code(), "Rejected proxy request");
                }
                ProxyError::BodyRead => {
                    tracing::debug!(request_id = %request_id, "Rejected unreadable request body");
                }
            }
            let mut response = e.into_response();
            response.headers_mut().extend(cors);
            response
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

async fn proxy_request(state: &AppState, request: Request<Body>, request_id: &str) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    let remainder = parts
        .uri
        .path()
        .strip_prefix(state.codec.mount_path())
        .unwrap_or_default();
    let parsed = parse_proxy_path(remainder)?;
    let target = validate_target_url(&parsed.target_url)?;
    let proxy_base = resolve_proxy_base(&parts.headers, &parts.uri, state.default_scheme);

    let body = if method_has_body(&parts.method) {
        Some(read_request_body(body, state.max_body_bytes).await?)
    } else {
        None
    };

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        target = %target,
        proxy_base = %proxy_base,
        "Fetching upstream"
    );

    let options = build_fetch_options(&target, &parts.method, &parts.headers, body, state.timeout);
    let upstream = state.upstream.send(options).await?;

    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let headers = response_headers(state, upstream.headers(), &parts.headers, status, &target, &proxy_base);

    tracing::debug!(
        request_id = %request_id,
        status = status.as_u16(),
        content_type = content_type.as_deref().unwrap_or(""),
        "Upstream responded"
    );

    // HEAD has no body to rewrite; relay the headers without a length.
    let rewriter = match parts.method {
        Method::HEAD => None,
        _ => select_rewriter(content_type.as_deref()),
    };

    match rewriter {
        None => Ok(stream_response(status, headers, upstream)),
        Some(kind) => {
            let ctx = RewriteContext::new(target, proxy_base, state.codec.clone());
            let timeout_ms = state.timeout.as_millis() as u64;
            Ok(rewrite_response(status, headers, upstream, kind, &ctx, timeout_ms).await?)
        }
    }
}

/// Sanitized upstream headers, redirect target re-encoded, CORS on top.
fn response_headers(
    state: &AppState,
    upstream: &HeaderMap,
    incoming: &HeaderMap,
    status: StatusCode,
    target: &Url,
    proxy_base: &str,
) -> HeaderMap {
    let mut headers = sanitize_upstream_headers(upstream);
    apply_redirect_rewrite(status, &mut headers, target, proxy_base, &state.codec);
    headers.extend(proxy_response_headers(incoming));
    headers
}
