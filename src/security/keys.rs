//! Device-bound access keys.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDate};
use dashmap::DashMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One access key as persisted by the key administration tooling.
///
/// Timestamps are milliseconds since the Unix epoch. Older key files store
/// them as digit strings or ISO-8601 dates; both are accepted, and anything
/// else reads as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKey {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub key: String,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub expires_at: Option<u64>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub expires_in_ms: Option<u64>,
    #[serde(default)]
    pub bound_device_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub bound_at: Option<u64>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub hidden: bool,
}

impl AccessKey {
    /// Absolute expiry. A duration without an absolute expiry counts from
    /// creation.
    pub fn effective_expiry(&self) -> Option<u64> {
        self.expires_at.or_else(|| {
            let created = self.created_at?;
            self.expires_in_ms.map(|ms| created.saturating_add(ms))
        })
    }

    /// Fill in what older key files leave out: a missing creation time
    /// falls back to the bind time, then to `now_ms`, and a bare duration is
    /// pinned to an absolute expiry counted from creation.
    pub fn normalize(&mut self, now_ms: u64) {
        let created = *self.created_at.get_or_insert(self.bound_at.unwrap_or(now_ms));
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in_ms.map(|ms| created.saturating_add(ms));
        }
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.effective_expiry().is_some_and(|expiry| now_ms > expiry)
    }
}

/// Concurrent key store indexed by key id.
#[derive(Debug, Clone, Default)]
pub struct DeviceKeyStore {
    inner: Arc<DashMap<String, AccessKey>>,
}

impl DeviceKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load keys from a JSON array.
    ///
    /// A missing or unreadable file yields an empty store; the gate then
    /// refuses every device until keys exist.
    pub fn load_from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let store = Self::new();
        match read_keys(path) {
            Ok(keys) => {
                let now = now_ms();
                for mut key in keys {
                    key.normalize(now);
                    store.inner.insert(key.id.clone(), key);
                }
                tracing::info!(path = %path.display(), count = store.len(), "Loaded access keys");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Key file not found, starting with no keys");
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to load access keys, starting with no keys");
            }
        }
        store
    }

    pub fn insert(&self, mut key: AccessKey) {
        key.normalize(now_ms());
        self.inner.insert(key.id.clone(), key);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// First non-expired key bound to `device_id`.
    pub fn bound_key_for_device(&self, device_id: &str) -> Option<AccessKey> {
        self.bound_key_for_device_at(device_id, now_ms())
    }

    fn bound_key_for_device_at(&self, device_id: &str, now_ms: u64) -> Option<AccessKey> {
        self.inner
            .iter()
            .find(|entry| {
                let key = entry.value();
                key.bound_device_id.as_deref() == Some(device_id) && !key.is_expired_at(now_ms)
            })
            .map(|entry| entry.value().clone())
    }
}

fn read_keys(path: &Path) -> std::io::Result<Vec<AccessKey>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(millis_from_value))
}

fn millis_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => parse_millis(s.trim()),
        _ => None,
    }
}

/// Digit string, RFC 3339 timestamp, or bare `YYYY-MM-DD` (UTC midnight).
fn parse_millis(s: &str) -> Option<u64> {
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }
    let ms = match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.timestamp_millis(),
        Err(_) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc()
            .timestamp_millis(),
    };
    u64::try_from(ms).ok()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
