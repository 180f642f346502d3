//! # Structured Logging
//!
//! Subscriber setup and span macros for sanitizer and sync operations.
//!
//! Every span carries an `operation_id` so that the events of one cycle can
//! be correlated in JSON output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, ObservabilityConfig};
use crate::errors::{Error, Result};

/// Create a tracing span for one sanitizer invocation.
///
/// ```rust,ignore
/// let span = sanitize_span!("route_replacing", "node-1");
/// let span = sanitize_span!("route_replacing", "node-1", cycle_id = %cycle_id);
/// ```
#[macro_export]
macro_rules! sanitize_span {
    ($sanitizer:expr, $node_id:expr) => {
        tracing::info_span!(
            "sanitize",
            sanitizer = %$sanitizer,
            node_id = %$node_id,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($sanitizer:expr, $node_id:expr, $($field:tt)*) => {
        tracing::info_span!(
            "sanitize",
            sanitizer = %$sanitizer,
            node_id = %$node_id,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for a translate → sanitize → publish cycle
#[macro_export]
macro_rules! sync_span {
    ($node_id:expr) => {
        tracing::info_span!(
            "sync_cycle",
            node_id = %$node_id,
            operation_id = %uuid::Uuid::new_v4(),
            version = tracing::field::Empty
        )
    };
    ($node_id:expr, $($field:tt)*) => {
        tracing::info_span!(
            "sync_cycle",
            node_id = %$node_id,
            operation_id = %uuid::Uuid::new_v4(),
            version = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Install the global log subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this when a subscriber
/// is already installed (for example from a test harness) is not an error.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            Error::config(format!("Invalid log level '{}': {}", config.log_level, e))
        })?,
    };

    let installed = if config.json_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = installed {
        tracing::debug!(error = %e, "Log subscriber already installed, keeping it");
    }
    Ok(())
}

/// Log configuration at startup
pub fn log_config_info(config: &Config) {
    tracing::info!(
        invalid_route_replace = config.invalid_config_policy.enabled,
        response_status_code = config.invalid_config_policy.response_status_code,
        fallback_cluster = %config.fallback_names.cluster,
        fallback_listener = %config.fallback_names.listener,
        metrics_enabled = config.observability.enable_metrics,
        "Flowplane sanitizer configuration"
    );
}
