//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the rewriting proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Proxy core settings (mount path, upstream timeout, body limit).
    pub proxy: ProxySettings,

    /// Device-key access gate.
    pub access: AccessConfig,

    /// Status endpoint and egress IP lookup.
    pub status: StatusConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Proxy core settings. Immutable for the lifetime of the process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Prefix under which `<mount>/<percent-encoded-url>` is served.
    pub mount_path: String,

    /// Upstream fetch deadline in milliseconds.
    pub timeout_ms: u64,

    /// Maximum request body accepted for POST/PUT/PATCH, in bytes.
    pub max_body_bytes: usize,

    /// Honour HTTP(S)_PROXY environment variables for upstream fetches.
    pub use_system_proxy: bool,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            mount_path: "/go".to_string(),
            timeout_ms: 30_000,
            max_body_bytes: 50 * 1024 * 1024, // 50MB
            use_system_proxy: false,
        }
    }
}

/// Device-key access gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AccessConfig {
    /// Enforce the gate. When disabled every proxy request passes through.
    pub enabled: bool,

    /// JSON file holding the access keys.
    pub keys_file: Option<String>,
}

/// Status endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Serve `GET /api/status`.
    pub enabled: bool,

    /// Endpoint returning `{"ip": "..."}` for the server's egress address.
    pub egress_lookup_url: String,

    /// How long a successful lookup stays fresh.
    pub success_ttl_secs: u64,

    /// How long a failed lookup is remembered before retrying.
    pub failure_ttl_secs: u64,

    /// Deadline for a single lookup in milliseconds.
    pub lookup_timeout_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            egress_lookup_url: "https://api.ipify.org?format=json".to_string(),
            success_ttl_secs: 600,
            failure_ttl_secs: 60,
            lookup_timeout_ms: 3_500,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
