//! # Snapshot Sanitizers
//!
//! Sanitizers run after translation and before distribution. Each one takes
//! the declared intent, the translated snapshot and the translator's reports,
//! and returns a repaired snapshot without touching its inputs.
//!
//! [`XdsSanitizers`] runs an ordered list of them, feeding each one's output
//! to the next. The first failure aborts the whole chain and nothing it
//! produced so far is kept.

pub mod fallback;
pub mod route_replacing;

use tracing::warn;

use crate::config::Config;
use crate::domain::{ApiSnapshot, ResourceReports};
use crate::observability::metrics::{record_sanitizer_run, Outcome};
use crate::utils::generate_id;
use crate::xds::Snapshot;
use crate::{Error, Result};

pub use fallback::{FallbackResources, FALLBACK_CLUSTER_NAME, FALLBACK_LISTENER_NAME};
pub use route_replacing::RouteReplacingSanitizer;

/// Identity of the cycle a sanitizer runs in, for log correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeContext {
    pub node_id: String,
    pub cycle_id: String,
}

impl SanitizeContext {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self { node_id: node_id.into(), cycle_id: generate_id() }
    }
}

/// A repair step over a translated snapshot.
///
/// Implementations must not mutate their inputs and must return the input
/// unchanged when their activation condition is not met.
pub trait XdsSanitizer: Send + Sync {
    /// Stable name used in logs, metrics and errors.
    fn name(&self) -> &'static str;

    fn sanitize_snapshot(
        &self,
        ctx: &SanitizeContext,
        api: &ApiSnapshot,
        snapshot: &Snapshot,
        reports: &ResourceReports,
    ) -> Result<Snapshot>;
}

/// Ordered sanitizer chain, assembled once at startup.
#[derive(Default)]
pub struct XdsSanitizers {
    sanitizers: Vec<Box<dyn XdsSanitizer>>,
}

impl std::fmt::Debug for XdsSanitizers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl XdsSanitizers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the default chain from configuration.
    ///
    /// Policy errors are fatal: the chain is never assembled with an invalid step.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let route_replacing = RouteReplacingSanitizer::new(
            &config.invalid_config_policy,
            &config.fallback_names,
        )?;

        Ok(Self::new().with(route_replacing))
    }

    /// Append a sanitizer to the end of the chain.
    pub fn with<S: XdsSanitizer + 'static>(mut self, sanitizer: S) -> Self {
        self.sanitizers.push(Box::new(sanitizer));
        self
    }

    pub fn len(&self) -> usize {
        self.sanitizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sanitizers.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sanitizers.iter().map(|s| s.name()).collect()
    }

    /// Run every sanitizer in order.
    ///
    /// Errors are attributed to the failing step. An empty chain returns a
    /// copy of the input.
    pub fn sanitize_snapshot(
        &self,
        ctx: &SanitizeContext,
        api: &ApiSnapshot,
        snapshot: &Snapshot,
        reports: &ResourceReports,
    ) -> Result<Snapshot> {
        let mut current = snapshot.clone();

        for sanitizer in &self.sanitizers {
            current = sanitizer.sanitize_snapshot(ctx, api, &current, reports).map_err(|e| {
                warn!(
                    sanitizer = sanitizer.name(),
                    node_id = %ctx.node_id,
                    cycle_id = %ctx.cycle_id,
                    error = %e,
                    "Sanitizer failed, aborting chain"
                );
                record_sanitizer_run(sanitizer.name(), Outcome::Failed);
                match e {
                    Error::Sanitizer { .. } => e,
                    other => Error::sanitizer(sanitizer.name(), other.to_string()),
                }
            })?;
        }

        Ok(current)
    }
}
