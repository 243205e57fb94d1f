//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RelayServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RelayServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: RelayServiceConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `PORT`, `RELAY_ALLOWED_HOSTS` and `RELAY_DISALLOWED_HOSTS` from the
/// process environment, then validate the result.
pub fn apply_env_overrides(config: RelayServiceConfig) -> Result<RelayServiceConfig, ConfigError> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Same as [`apply_env_overrides`] with an explicit variable lookup.
pub fn apply_overrides<F>(mut config: RelayServiceConfig, lookup: F) -> Result<RelayServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT").filter(|p| !p.trim().is_empty()) {
        config.listener.bind_address = format!("0.0.0.0:{}", port.trim());
    }

    if let Some(hosts) = lookup("RELAY_ALLOWED_HOSTS") {
        config.security.allowed_hosts = split_list(&hosts);
    }

    if let Some(entries) = lookup("RELAY_DISALLOWED_HOSTS") {
        config.relay.disallowed = split_list(&entries);
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
