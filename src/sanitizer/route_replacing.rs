//! Route-replacing sanitizer
//!
//! When the translator reports a route pointing at a missing upstream, every
//! route cluster reference that does not belong to a declared upstream is
//! pointed at the fallback cluster, and the fallback cluster and listener are
//! added to the snapshot. Weighted entries are rewritten one by one, so
//! weights and order stay as they were.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::{Config, FallbackNames, InvalidConfigPolicy};
use crate::domain::{ApiSnapshot, DiagnosticCode, ResourceReports};
use crate::observability::metrics::{record_routes_replaced, record_sanitizer_run, Outcome};
use crate::sanitizer::fallback::FallbackResources;
use crate::sanitizer::{SanitizeContext, XdsSanitizer};
use crate::xds::helpers::{cluster_references, RouteConfigModifier};
use crate::xds::Snapshot;
use crate::Result;

#[derive(Debug, Clone)]
pub struct RouteReplacingSanitizer {
    enabled: bool,
    fallback: FallbackResources,
}

impl RouteReplacingSanitizer {
    pub const NAME: &'static str = "route_replacing";

    /// Build the sanitizer and its fallback resources.
    ///
    /// The policy is validated even when replacement is disabled.
    pub fn new(policy: &InvalidConfigPolicy, names: &FallbackNames) -> Result<Self> {
        let fallback = FallbackResources::new(policy, names)?;
        Ok(Self { enabled: policy.enabled, fallback })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.invalid_config_policy, &config.fallback_names)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn fallback(&self) -> &FallbackResources {
        &self.fallback
    }

    fn replace_missing(&self, snapshot: &mut Snapshot, valid: &HashSet<String>) -> usize {
        let fallback_name = self.fallback.cluster_name();
        let is_valid = |name: &str| name == fallback_name || valid.contains(name);

        let mut replaced = 0;
        snapshot.routes.update(|route_config| {
            if cluster_references(route_config).all(is_valid) {
                return None;
            }

            let mut modifier = RouteConfigModifier::new(route_config.clone());
            let route_config_name = route_config.name.as_str();
            replaced += modifier.for_each_cluster_reference(|site, cluster| {
                if is_valid(cluster) {
                    return None;
                }
                debug!(
                    route_config = route_config_name,
                    virtual_host = site.virtual_host,
                    route = site.route,
                    weighted_index = ?site.weighted_index,
                    cluster,
                    fallback = fallback_name,
                    "Replacing reference to missing cluster"
                );
                Some(fallback_name.to_string())
            });

            modifier.finish_if_modified()
        });

        replaced
    }
}

impl XdsSanitizer for RouteReplacingSanitizer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn sanitize_snapshot(
        &self,
        ctx: &SanitizeContext,
        api: &ApiSnapshot,
        snapshot: &Snapshot,
        reports: &ResourceReports,
    ) -> Result<Snapshot> {
        let _span = crate::sanitize_span!(Self::NAME, ctx.node_id, cycle_id = %ctx.cycle_id)
            .entered();

        if !self.enabled {
            debug!("Route replacement disabled, passing snapshot through");
            record_sanitizer_run(Self::NAME, Outcome::Skipped);
            return Ok(snapshot.clone());
        }

        if !reports.has_warning(DiagnosticCode::MissingUpstream) {
            debug!("No missing upstream warnings, passing snapshot through");
            record_sanitizer_run(Self::NAME, Outcome::Skipped);
            return Ok(snapshot.clone());
        }

        let valid = api.cluster_names();
        let mut sanitized = snapshot.clone();
        let replaced = self.replace_missing(&mut sanitized, &valid);

        sanitized.clusters.insert_shared(self.fallback.cluster().clone());
        sanitized.listeners.insert_shared(self.fallback.listener().clone());

        info!(
            replaced,
            valid_clusters = valid.len(),
            fallback_cluster = self.fallback.cluster_name(),
            "Replaced routes with missing upstreams"
        );
        record_routes_replaced(Self::NAME, replaced);
        record_sanitizer_run(Self::NAME, Outcome::Repaired);

        Ok(sanitized)
    }
}
