//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::dialer::DialSettings;
use crate::security::address_guard::DEFAULT_DISALLOWED;

/// Root configuration for the request relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayServiceConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Outbound call behaviour and the address deny-list.
    pub relay: RelayConfig,

    /// Inbound request screening.
    pub security: SecurityConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3041").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3041".to_string(),
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

/// Outbound relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Budget for one whole relay invocation, redirects and body reads included.
    pub client_timeout_secs: u64,

    /// TCP connect timeout.
    pub connect_timeout_secs: u64,

    /// TCP keep-alive interval.
    pub keepalive_secs: u64,

    /// Redirects followed before the last redirect response is returned as final.
    pub max_redirects: usize,

    /// Largest response body buffered per hop.
    pub max_response_bytes: usize,

    /// Deny entries: CIDR prefixes or exact host tokens.
    pub disallowed: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            client_timeout_secs: 10,
            connect_timeout_secs: 30,
            keepalive_secs: 30,
            max_redirects: 9,
            max_response_bytes: 32 * 1024 * 1024, // 32MB
            disallowed: DEFAULT_DISALLOWED.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RelayConfig {
    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn dial_settings(&self) -> DialSettings {
        DialSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            keepalive: Duration::from_secs(self.keepalive_secs),
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
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
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Inbound request screening.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Hosts (without port) this service answers for.
    pub allowed_hosts: Vec<String>,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Require `application/json` on every non-GET request.
    pub require_json: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            max_body_size: 2 * 1024 * 1024, // 2MB
            require_json: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: RelayServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:3041");
        assert_eq!(config.relay.max_redirects, 9);
        assert_eq!(config.relay.client_timeout(), Duration::from_secs(10));
        assert_eq!(config.relay.disallowed.len(), DEFAULT_DISALLOWED.len());
        assert!(config.security.require_json);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: RelayServiceConfig = toml::from_str(
            r#"
            [relay]
            disallowed = ["10.0.0.0/8"]
            client_timeout_secs = 3

            [security]
            allowed_hosts = ["relay.example"]
            "#,
        )
        .unwrap();
        assert_eq!(config.relay.disallowed, vec!["10.0.0.0/8"]);
        assert_eq!(config.relay.client_timeout_secs, 3);
        assert_eq!(config.relay.connect_timeout_secs, 30);
        assert_eq!(config.security.allowed_hosts, vec!["relay.example"]);
        assert_eq!(config.security.max_body_size, 2 * 1024 * 1024);
    }
}
