//! Cached lookup of the server's public egress IP.
//!
//! Readers never wait on the network: they get the current snapshot and,
//! when it is stale, kick off at most one background refresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::config::StatusConfig;
use crate::observability::metrics;

const USER_AGENT: &str = "BREAD/1.0 (+ipify)";

/// Result of the most recent lookup. Times are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EgressSnapshot {
    pub ip: Option<String>,
    pub checked_at: u64,
    pub expires_at: u64,
    pub error: Option<String>,
}

/// What `/api/status` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EgressReport {
    pub ip: Option<String>,
    pub checked_at: u64,
    pub stale: bool,
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct LookupBody {
    ip: Option<String>,
}

struct Inner {
    snapshot: ArcSwap<EgressSnapshot>,
    in_flight: AtomicBool,
    client: reqwest::Client,
    lookup_url: String,
    success_ttl: Duration,
    failure_ttl: Duration,
}

/// Shared handle; clones see the same snapshot.
#[derive(Clone)]
pub struct EgressIpCache {
    inner: Arc<Inner>,
}

impl EgressIpCache {
    pub fn new(config: &StatusConfig, use_system_proxy: bool) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(config.lookup_timeout_ms));
        if !use_system_proxy {
            builder = builder.no_proxy();
        }
        Ok(Self {
            inner: Arc::new(Inner {
                snapshot: ArcSwap::from_pointee(EgressSnapshot::default()),
                in_flight: AtomicBool::new(false),
                client: builder.build()?,
                lookup_url: config.egress_lookup_url.clone(),
                success_ttl: Duration::from_secs(config.success_ttl_secs),
                failure_ttl: Duration::from_secs(config.failure_ttl_secs),
            }),
        })
    }

    pub fn snapshot(&self) -> Arc<EgressSnapshot> {
        self.inner.snapshot.load_full()
    }

    /// Current report; schedules a refresh in the background if stale.
    pub fn report(&self) -> EgressReport {
        let snapshot = self.snapshot();
        let stale = snapshot.expires_at <= now_ms();
        if stale {
            self.spawn_refresh();
        }
        EgressReport {
            ip: snapshot.ip.clone(),
            checked_at: snapshot.checked_at,
            stale,
            error: snapshot.error.clone(),
        }
    }

    /// Spawn a refresh unless one is already running. Returns whether one
    /// was started.
    pub fn spawn_refresh(&self) -> bool {
        if self.inner.in_flight.swap(true, Ordering::AcqRel) {
            return false;
        }
        let cache = self.clone();
        tokio::spawn(async move {
            cache.refresh_now().await;
            cache.inner.in_flight.store(false, Ordering::Release);
        });
        true
    }

    /// Perform one lookup and publish the outcome. A failure keeps the last
    /// known IP.
    pub async fn refresh_now(&self) {
        let now = now_ms();
        let previous = self.snapshot();
        let next = match self.lookup().await {
            Ok(ip) => {
                metrics::record_egress_refresh("success");
                tracing::debug!(ip = %ip, "Egress IP refreshed");
                EgressSnapshot {
                    ip: Some(ip),
                    checked_at: now,
                    expires_at: now + self.inner.success_ttl.as_millis() as u64,
                    error: None,
                }
            }
            Err(error) => {
                metrics::record_egress_refresh("failure");
                tracing::warn!(error = %error, url = %self.inner.lookup_url, "Egress IP lookup failed");
                EgressSnapshot {
                    ip: previous.ip.clone(),
                    checked_at: now,
                    expires_at: now + self.inner.failure_ttl.as_millis() as u64,
                    error: Some(error),
                }
            }
        };
        self.inner.snapshot.store(Arc::new(next));
    }

    async fn lookup(&self) -> Result<String, String> {
        let response = self
            .inner
            .client
            .get(&self.inner.lookup_url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        let body = response.json::<LookupBody>().await.ok();
        let ip = body
            .and_then(|b| b.ip)
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty());
        match ip {
            Some(ip) if status.is_success() => Ok(ip),
            _ => Err(format!("egress_ip_fetch_failed status={}", status.as_u16())),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
