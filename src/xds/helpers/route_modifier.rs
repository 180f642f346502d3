//! Helper for rewriting cluster references inside Envoy route configurations.
//!
//! Routes reference clusters in two ways: a single cluster name, or an
//! ordered list of weighted clusters. Both are reached through
//! `route.action = Route(RouteAction { cluster_specifier, .. })`; every other
//! action (redirect, direct response, …) carries no cluster reference.

use envoy_types::pb::envoy::config::route::v3::{
    route::Action, route_action::ClusterSpecifier, RouteConfiguration,
};

/// Where a cluster reference was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSite<'a> {
    pub virtual_host: &'a str,
    pub route: &'a str,
    /// Position in the weighted cluster list, `None` for a single-cluster action
    pub weighted_index: Option<usize>,
}

/// Iterate every cluster name referenced by a route configuration, in route order.
pub fn cluster_references(route_config: &RouteConfiguration) -> impl Iterator<Item = &str> {
    route_config
        .virtual_hosts
        .iter()
        .flat_map(|vh| vh.routes.iter())
        .filter_map(|route| match &route.action {
            Some(Action::Route(action)) => action.cluster_specifier.as_ref(),
            _ => None,
        })
        .flat_map(specifier_clusters)
}

fn specifier_clusters(specifier: &ClusterSpecifier) -> Box<dyn Iterator<Item = &str> + '_> {
    match specifier {
        ClusterSpecifier::Cluster(name) => Box::new(std::iter::once(name.as_str())),
        ClusterSpecifier::WeightedClusters(weighted) => {
            Box::new(weighted.clusters.iter().map(|cw| cw.name.as_str()))
        }
        _ => Box::new(std::iter::empty()),
    }
}

/// Helper for modifying the cluster references of a route configuration.
///
/// # Example
///
/// ```rust,ignore
/// let mut modifier = RouteConfigModifier::new(route_config.clone());
/// modifier.for_each_cluster_reference(|_, name| {
///     (!valid.contains(name)).then(|| "fallback".to_string())
/// });
/// if let Some(fixed) = modifier.finish_if_modified() {
///     // publish `fixed`
/// }
/// ```
pub struct RouteConfigModifier {
    route_config: RouteConfiguration,
    replaced: usize,
}

impl RouteConfigModifier {
    pub fn new(route_config: RouteConfiguration) -> Self {
        Self { route_config, replaced: 0 }
    }

    pub fn is_modified(&self) -> bool {
        self.replaced > 0
    }

    /// Visit every cluster reference in place.
    ///
    /// The callback returns `Some(new_name)` to rewrite the reference or `None`
    /// to leave it. Only the name changes; weights, per-entry metadata, the
    /// route match and all ordering are preserved. Returns the number of
    /// references rewritten by this call.
    pub fn for_each_cluster_reference<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(ReferenceSite<'_>, &str) -> Option<String>,
    {
        let mut rewritten = 0;

        for vh in self.route_config.virtual_hosts.iter_mut() {
            let virtual_host = vh.name.as_str();
            for route in vh.routes.iter_mut() {
                let route_name = route.name.as_str();
                let Some(Action::Route(action)) = &mut route.action else {
                    continue;
                };

                match &mut action.cluster_specifier {
                    Some(ClusterSpecifier::Cluster(name)) => {
                        let site =
                            ReferenceSite { virtual_host, route: route_name, weighted_index: None };
                        if let Some(new_name) = f(site, name.as_str()) {
                            if *name != new_name {
                                *name = new_name;
                                rewritten += 1;
                            }
                        }
                    }
                    Some(ClusterSpecifier::WeightedClusters(weighted)) => {
                        for (idx, entry) in weighted.clusters.iter_mut().enumerate() {
                            let site = ReferenceSite {
                                virtual_host,
                                route: route_name,
                                weighted_index: Some(idx),
                            };
                            if let Some(new_name) = f(site, entry.name.as_str()) {
                                if entry.name != new_name {
                                    entry.name = new_name;
                                    rewritten += 1;
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        self.replaced += rewritten;
        rewritten
    }

    /// Return the rewritten route configuration if anything changed.
    pub fn finish_if_modified(self) -> Option<RouteConfiguration> {
        if self.is_modified() {
            Some(self.route_config)
        } else {
            None
        }
    }
}
