//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Catch deny-list entries that look like CIDR prefixes but are not
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use ipnet::IpNet;
use thiserror::Error;

use crate::config::schema::RelayServiceConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} {value:?}: expected host:port")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("unknown log level {0:?}")]
    InvalidLogLevel(String),

    #[error("security.allowed_hosts must not be empty")]
    NoAllowedHosts,

    #[error("relay.disallowed entry {0:?} is not a valid CIDR prefix")]
    InvalidPrefix(String),
}

pub fn validate_config(config: &RelayServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    for (field, value) in [
        ("relay.client_timeout_secs", config.relay.client_timeout_secs),
        ("relay.connect_timeout_secs", config.relay.connect_timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }
    if config.relay.max_response_bytes == 0 {
        errors.push(ValidationError::Zero("relay.max_response_bytes"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::Zero("security.max_body_size"));
    }

    if config.security.allowed_hosts.is_empty() {
        errors.push(ValidationError::NoAllowedHosts);
    }

    errors.extend(
        config
            .relay
            .disallowed
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| entry.contains('/') && entry.parse::<IpNet>().is_err())
            .map(|entry| ValidationError::InvalidPrefix(entry.to_string())),
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
