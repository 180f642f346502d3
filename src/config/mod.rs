//! # Configuration Management
//!
//! Configuration is read from `FLOWPLANE_*` environment variables or from a
//! YAML document and validated before the sanitizer chain is assembled.

pub mod settings;

use std::path::Path;
use std::str::FromStr;

use crate::{Error, Result};

pub use settings::{Config, FallbackNames, InvalidConfigPolicy, ObservabilityConfig};

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup, unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("FLOWPLANE_INVALID_ROUTE_REPLACE") {
            config.invalid_config_policy.enabled =
                parse_bool("FLOWPLANE_INVALID_ROUTE_REPLACE", &value)?;
        }
        if let Some(value) = lookup("FLOWPLANE_INVALID_ROUTE_RESPONSE_CODE") {
            config.invalid_config_policy.response_status_code =
                parse_value("FLOWPLANE_INVALID_ROUTE_RESPONSE_CODE", &value)?;
        }
        if let Some(value) = lookup("FLOWPLANE_INVALID_ROUTE_RESPONSE_BODY") {
            config.invalid_config_policy.response_body = value;
        }
        if let Some(value) = lookup("FLOWPLANE_FALLBACK_CLUSTER_NAME") {
            config.fallback_names.cluster = value;
        }
        if let Some(value) = lookup("FLOWPLANE_FALLBACK_LISTENER_NAME") {
            config.fallback_names.listener = value;
        }
        if let Some(value) = lookup("FLOWPLANE_LOG_LEVEL") {
            config.observability.log_level = value;
        }
        if let Some(value) = lookup("FLOWPLANE_LOG_JSON") {
            config.observability.json_logging = parse_bool("FLOWPLANE_LOG_JSON", &value)?;
        }
        if let Some(value) = lookup("FLOWPLANE_ENABLE_METRICS") {
            config.observability.enable_metrics = parse_bool("FLOWPLANE_ENABLE_METRICS", &value)?;
        }

        Ok(config)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(Error::config(format!("Invalid boolean for {}: '{}'", key, other))),
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::config(format!("Invalid value for {}: {}", key, e)))
}
