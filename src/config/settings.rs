//! # Configuration Settings
//!
//! Defines the configuration structure for the sanitization pipeline.

use crate::errors::{Error, Result};
use crate::sanitizer::fallback::{FALLBACK_CLUSTER_NAME, FALLBACK_LISTENER_NAME};
use crate::utils::{is_reserved_name, RESERVED_NAME_SEPARATOR};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Policy for routes that point at upstreams which do not exist
    #[validate(nested)]
    pub invalid_config_policy: InvalidConfigPolicy,

    /// Reserved names of the fallback resources
    #[validate(nested)]
    pub fallback_names: FallbackNames,

    /// Logging and metrics configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;

        self.validate_custom()?;

        Ok(())
    }

    fn validate_custom(&self) -> Result<()> {
        if self.fallback_names.cluster == self.fallback_names.listener {
            return Err(Error::validation(
                "Fallback cluster and listener names must differ",
            ));
        }

        Ok(())
    }
}

/// What to do with routes whose upstream is missing.
///
/// Recognized keys are `enabled`, `responseStatusCode` and `responseBody`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct InvalidConfigPolicy {
    /// Replace dangling routes with the fallback cluster
    pub enabled: bool,

    /// Status served for replaced routes
    #[validate(range(
        min = 100,
        max = 599,
        message = "Response status code must be between 100 and 599"
    ))]
    pub response_status_code: u32,

    /// Body served for replaced routes
    pub response_body: String,
}

impl Default for InvalidConfigPolicy {
    fn default() -> Self {
        Self { enabled: false, response_status_code: 500, response_body: String::new() }
    }
}

impl InvalidConfigPolicy {
    /// Policy with replacement switched on.
    pub fn replacing(response_status_code: u32, response_body: impl Into<String>) -> Self {
        Self { enabled: true, response_status_code, response_body: response_body.into() }
    }
}

/// Reserved names of the fallback cluster and listener.
///
/// Both must be impossible to declare as a user resource. Every name an
/// upstream can translate to is `name.namespace` built from the user naming
/// rule, so reserved names must carry [`RESERVED_NAME_SEPARATOR`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(default)]
pub struct FallbackNames {
    #[validate(custom(function = "validate_reserved_name"))]
    pub cluster: String,

    #[validate(custom(function = "validate_reserved_name"))]
    pub listener: String,
}

impl Default for FallbackNames {
    fn default() -> Self {
        Self {
            cluster: FALLBACK_CLUSTER_NAME.to_string(),
            listener: FALLBACK_LISTENER_NAME.to_string(),
        }
    }
}

fn validate_reserved_name(name: &str) -> std::result::Result<(), ValidationError> {
    if name.is_empty() {
        let mut err = ValidationError::new("reserved_name");
        err.message = Some("Reserved name cannot be empty".into());
        return Err(err);
    }
    if !is_reserved_name(name) {
        let mut err = ValidationError::new("reserved_name");
        err.message = Some(
            format!(
                "Reserved name must contain '{}' so no upstream can produce it",
                RESERVED_NAME_SEPARATOR
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Logging and metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,

    /// Record sanitizer and sync metrics through the `metrics` facade
    pub enable_metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false, enable_metrics: true }
    }
}
