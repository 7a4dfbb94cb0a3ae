//! Access-control gate in front of the proxy routes.
//!
//! Resolves a device identifier (header first, then cookie) to a bound,
//! non-expired access key. Requests that fail are answered with 403 and a
//! machine-readable reason; the proxy handler never runs for them.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::observability::metrics;
use crate::security::keys::DeviceKeyStore;

pub const DEVICE_ID_HEADER: &str = "x-device-id";
pub const DEVICE_ID_COOKIE: &str = "deviceId";

/// State required for the gate.
#[derive(Debug, Clone)]
pub struct AccessGate {
    pub store: DeviceKeyStore,
    pub enabled: bool,
}

/// Attached to requests that passed the gate.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub device_id: String,
    pub key_id: String,
}

/// Why the gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    DeviceIdRequired,
    KeyRequired,
}

impl Denial {
    pub fn reason(&self) -> &'static str {
        match self {
            Denial::DeviceIdRequired => "device_id_required",
            Denial::KeyRequired => "key_required",
        }
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(json!({ "ok": false, "reason": self.reason() })),
        )
            .into_response()
    }
}

impl AccessGate {
    pub fn new(store: DeviceKeyStore, enabled: bool) -> Self {
        Self { store, enabled }
    }

    /// Passes everything through.
    pub fn disabled() -> Self {
        Self::new(DeviceKeyStore::new(), false)
    }

    /// Check the candidates in order; the first with a live bound key wins.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<DeviceContext, Denial> {
        let candidates = device_id_candidates(headers);
        if candidates.is_empty() {
            return Err(Denial::DeviceIdRequired);
        }
        candidates
            .into_iter()
            .find_map(|device_id| {
                self.store.bound_key_for_device(&device_id).map(|key| DeviceContext {
                    device_id,
                    key_id: key.id,
                })
            })
            .ok_or(Denial::KeyRequired)
    }
}

pub async fn access_control_middleware(
    State(gate): State<AccessGate>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if !gate.enabled {
        return next.run(req).await;
    }

    match gate.authorize(req.headers()) {
        Ok(ctx) => {
            tracing::debug!(device_id = %ctx.device_id, key_id = %ctx.key_id, "Access granted");
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(denial) => {
            metrics::record_access_denied(denial.reason());
            tracing::info!(reason = denial.reason(), path = %req.uri().path(), "Access denied");
            denial.into_response()
        }
    }
}

/// Non-empty device IDs from the header, then the cookie.
fn device_id_candidates(headers: &HeaderMap) -> Vec<String> {
    let from_header = headers
        .get(DEVICE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let from_cookie = cookie_value(headers, DEVICE_ID_COOKIE);

    [from_header, from_cookie]
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Value of the first cookie called `name` across all `Cookie` headers.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| {
            let v = v.trim().trim_matches('"');
            urlencoding::decode(v).map_or_else(|_| v.to_string(), |d| d.into_owned())
        })
}
