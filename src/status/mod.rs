//! Status reporting subsystem.
//!
//! # Data Flow
//! ```text
//! GET /api/status
//!     → mod.rs (assemble report, never waits on the network)
//!     → egress.rs (cached egress IP, single-flight background refresh)
//! ```
//!
//! # Design Decisions
//! - The egress cache is an owned object with an explicit TTL policy
//! - The endpoint sits outside the access gate

pub mod egress;

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;

pub use egress::{EgressIpCache, EgressReport, EgressSnapshot};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub ok: bool,
    pub server_time: u64,
    pub version: &'static str,
    pub mount_path: String,
    pub server_egress: Option<EgressReport>,
}

pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let server_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    Json(StatusResponse {
        ok: true,
        server_time,
        version: env!("CARGO_PKG_VERSION"),
        mount_path: state.codec.mount_path().to_string(),
        server_egress: state.egress.as_ref().map(EgressIpCache::report),
    })
}
