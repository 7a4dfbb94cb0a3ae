//! Configuration validation.
//!
//! Serde handles the syntax; this module checks values that only make sense
//! together (mount path shape, positive limits, parseable addresses). All
//! errors are collected, not just the first.

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

fn error(field: &'static str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field,
        message: message.into(),
    }
}

/// Validate a parsed configuration, returning every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(error(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(error("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.trim().is_empty() {
            errors.push(error("listener.tls.key_path", "must not be empty"));
        }
    }

    let mount = config.proxy.mount_path.as_str();
    if !mount.starts_with('/') {
        errors.push(error("proxy.mount_path", "must start with '/'"));
    } else if mount == "/" || mount.ends_with('/') {
        errors.push(error("proxy.mount_path", "must not be '/' or end with '/'"));
    }
    if mount.contains(['{', '}', '*']) {
        errors.push(error("proxy.mount_path", "must not contain route wildcards"));
    }
    if config.proxy.timeout_ms == 0 {
        errors.push(error("proxy.timeout_ms", "must be greater than zero"));
    }
    if config.proxy.max_body_bytes == 0 {
        errors.push(error("proxy.max_body_bytes", "must be greater than zero"));
    }

    if config.access.enabled && config.access.keys_file.is_none() {
        tracing::warn!("access gate enabled without keys_file; every proxy request will be denied");
    }

    if config.status.enabled {
        match url::Url::parse(&config.status.egress_lookup_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            _ => errors.push(error(
                "status.egress_lookup_url",
                "must be an absolute http(s) URL",
            )),
        }
        if config.status.success_ttl_secs == 0 || config.status.failure_ttl_secs == 0 {
            errors.push(error("status", "egress TTLs must be greater than zero"));
        }
        if config.status.lookup_timeout_ms == 0 {
            errors.push(error("status.lookup_timeout_ms", "must be greater than zero"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(error(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ProxyConfig::default();
        config.proxy.mount_path = "go/".into();
        config.proxy.timeout_ms = 0;
        config.listener.bind_address = "not-an-address".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"proxy.mount_path"));
        assert!(fields.contains(&"proxy.timeout_ms"));
        assert!(fields.contains(&"listener.bind_address"));
    }

    #[test]
    fn rejects_root_and_trailing_slash_mounts() {
        for mount in ["/", "/go/"] {
            let mut config = ProxyConfig::default();
            config.proxy.mount_path = mount.into();
            assert!(validate_config(&config).is_err(), "{mount} should be rejected");
        }
    }

    #[test]
    fn rejects_non_http_egress_lookup() {
        let mut config = ProxyConfig::default();
        config.status.egress_lookup_url = "ftp://example.com/ip".into();
        assert!(validate_config(&config).is_err());
    }
}
