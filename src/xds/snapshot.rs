//! xDS snapshot (resource graph)
//!
//! A [`Snapshot`] holds every resource one proxy receives in a single update,
//! grouped by kind and indexed by name. Resources are stored behind `Arc` so
//! that cloning a snapshot shares untouched resources while edits go through
//! copy-on-write and never alias the source snapshot.
//!
//! A snapshot is *consistent* when every cross-kind reference resolves within
//! it; see [`Snapshot::consistent`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use envoy_types::pb::envoy::config::cluster::v3::cluster::{ClusterDiscoveryType, DiscoveryType};
use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::endpoint::v3::ClusterLoadAssignment;
use envoy_types::pb::envoy::config::listener::v3::Listener;
use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;
use prost::Message;
use sha2::{Digest, Sha256};

use crate::xds::helpers::{cluster_references, listener_route_names};
use crate::xds::resources::{CLUSTER_TYPE_URL, ENDPOINT_TYPE_URL, LISTENER_TYPE_URL, ROUTE_TYPE_URL};
use crate::{Error, Result};

/// Resource kinds carried by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Cluster,
    Endpoint,
    Route,
    Listener,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] =
        [ResourceKind::Cluster, ResourceKind::Endpoint, ResourceKind::Route, ResourceKind::Listener];

    pub fn type_url(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => CLUSTER_TYPE_URL,
            ResourceKind::Endpoint => ENDPOINT_TYPE_URL,
            ResourceKind::Route => ROUTE_TYPE_URL,
            ResourceKind::Listener => LISTENER_TYPE_URL,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => "cluster",
            ResourceKind::Endpoint => "endpoint",
            ResourceKind::Route => "route",
            ResourceKind::Listener => "listener",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An Envoy resource that can live in a snapshot.
pub trait NamedResource: Message + Clone + PartialEq + Default {
    const KIND: ResourceKind;

    fn resource_name(&self) -> &str;
}

impl NamedResource for Cluster {
    const KIND: ResourceKind = ResourceKind::Cluster;

    fn resource_name(&self) -> &str {
        &self.name
    }
}

impl NamedResource for ClusterLoadAssignment {
    const KIND: ResourceKind = ResourceKind::Endpoint;

    fn resource_name(&self) -> &str {
        &self.cluster_name
    }
}

impl NamedResource for RouteConfiguration {
    const KIND: ResourceKind = ResourceKind::Route;

    fn resource_name(&self) -> &str {
        &self.name
    }
}

impl NamedResource for Listener {
    const KIND: ResourceKind = ResourceKind::Listener;

    fn resource_name(&self) -> &str {
        &self.name
    }
}

/// Name-indexed collection of one resource kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Resources<T> {
    items: BTreeMap<String, Arc<T>>,
}

impl<T> Default for Resources<T> {
    fn default() -> Self {
        Self { items: BTreeMap::new() }
    }
}

impl<T: NamedResource> Resources<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.items.get(name).map(Arc::as_ref)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Iterate resources ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.items.iter().map(|(name, item)| (name.as_str(), item.as_ref()))
    }

    /// Insert a resource under its own name, returning any resource it replaced.
    pub fn insert(&mut self, resource: T) -> Option<Arc<T>> {
        self.insert_shared(Arc::new(resource))
    }

    /// Insert an already shared resource without copying it.
    pub fn insert_shared(&mut self, resource: Arc<T>) -> Option<Arc<T>> {
        self.items.insert(resource.resource_name().to_string(), resource)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<T>> {
        self.items.remove(name)
    }

    /// Replace every resource for which `f` returns a new value.
    ///
    /// Resources left alone stay shared with any snapshot this one was cloned
    /// from. Returns the number of replaced resources.
    pub fn update<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&T) -> Option<T>,
    {
        let mut updated = 0;
        for item in self.items.values_mut() {
            if let Some(replacement) = f(item) {
                *item = Arc::new(replacement);
                updated += 1;
            }
        }
        updated
    }

    /// Content-derived version of this collection.
    pub fn version(&self) -> String {
        let mut hasher = Sha256::new();
        self.digest_into(&mut hasher);
        truncated_hex(hasher)
    }

    fn digest_into(&self, hasher: &mut Sha256) {
        for (name, item) in &self.items {
            let encoded = item.encode_to_vec();
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update((encoded.len() as u64).to_le_bytes());
            hasher.update(&encoded);
        }
    }
}

impl<T: NamedResource> FromIterator<T> for Resources<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut resources = Self::new();
        for resource in iter {
            resources.insert(resource);
        }
        resources
    }
}

fn truncated_hex(hasher: Sha256) -> String {
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Versioned set of xDS resources for one proxy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub clusters: Resources<Cluster>,
    pub endpoints: Resources<ClusterLoadAssignment>,
    pub routes: Resources<RouteConfiguration>,
    pub listeners: Resources<Listener>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clusters(mut self, clusters: impl IntoIterator<Item = Cluster>) -> Self {
        clusters.into_iter().for_each(|c| {
            self.clusters.insert(c);
        });
        self
    }

    pub fn with_endpoints(
        mut self,
        endpoints: impl IntoIterator<Item = ClusterLoadAssignment>,
    ) -> Self {
        endpoints.into_iter().for_each(|e| {
            self.endpoints.insert(e);
        });
        self
    }

    pub fn with_routes(mut self, routes: impl IntoIterator<Item = RouteConfiguration>) -> Self {
        routes.into_iter().for_each(|r| {
            self.routes.insert(r);
        });
        self
    }

    pub fn with_listeners(mut self, listeners: impl IntoIterator<Item = Listener>) -> Self {
        listeners.into_iter().for_each(|l| {
            self.listeners.insert(l);
        });
        self
    }

    pub fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        match kind {
            ResourceKind::Cluster => self.clusters.contains(name),
            ResourceKind::Endpoint => self.endpoints.contains(name),
            ResourceKind::Route => self.routes.contains(name),
            ResourceKind::Listener => self.listeners.contains(name),
        }
    }

    /// Resource names of a kind, ordered.
    pub fn names(&self, kind: ResourceKind) -> Vec<String> {
        let names: Box<dyn Iterator<Item = &str>> = match kind {
            ResourceKind::Cluster => Box::new(self.clusters.names()),
            ResourceKind::Endpoint => Box::new(self.endpoints.names()),
            ResourceKind::Route => Box::new(self.routes.names()),
            ResourceKind::Listener => Box::new(self.listeners.names()),
        };
        names.map(str::to_string).collect()
    }

    pub fn len(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Cluster => self.clusters.len(),
            ResourceKind::Endpoint => self.endpoints.len(),
            ResourceKind::Route => self.routes.len(),
            ResourceKind::Listener => self.listeners.len(),
        }
    }

    pub fn kind_version(&self, kind: ResourceKind) -> String {
        match kind {
            ResourceKind::Cluster => self.clusters.version(),
            ResourceKind::Endpoint => self.endpoints.version(),
            ResourceKind::Route => self.routes.version(),
            ResourceKind::Listener => self.listeners.version(),
        }
    }

    /// Content-derived version of the whole snapshot.
    pub fn version(&self) -> String {
        let mut hasher = Sha256::new();
        for kind in ResourceKind::ALL {
            hasher.update(kind.type_url().as_bytes());
            match kind {
                ResourceKind::Cluster => self.clusters.digest_into(&mut hasher),
                ResourceKind::Endpoint => self.endpoints.digest_into(&mut hasher),
                ResourceKind::Route => self.routes.digest_into(&mut hasher),
                ResourceKind::Listener => self.listeners.digest_into(&mut hasher),
            }
        }
        truncated_hex(hasher)
    }

    /// Check that every cross-kind reference resolves within this snapshot.
    ///
    /// Checks route → cluster references (single and weighted), listener →
    /// route table references (RDS), and EDS cluster → endpoint assignment.
    pub fn consistent(&self) -> Result<()> {
        let mut dangling = Vec::new();

        for (name, route_config) in self.routes.iter() {
            for cluster in cluster_references(route_config) {
                if !self.clusters.contains(cluster) {
                    dangling.push(format!(
                        "route config '{}' references missing cluster '{}'",
                        name, cluster
                    ));
                }
            }
        }

        for (name, listener) in self.listeners.iter() {
            for route_name in listener_route_names(listener)? {
                if !self.routes.contains(&route_name) {
                    dangling.push(format!(
                        "listener '{}' references missing route config '{}'",
                        name, route_name
                    ));
                }
            }
        }

        for (name, cluster) in self.clusters.iter() {
            if let Some(service_name) = eds_service_name(cluster) {
                if !self.endpoints.contains(service_name) {
                    dangling.push(format!(
                        "EDS cluster '{}' has no endpoint assignment '{}'",
                        name, service_name
                    ));
                }
            }
        }

        if dangling.is_empty() {
            Ok(())
        } else {
            Err(Error::inconsistent(dangling.join("; ")))
        }
    }
}

/// Endpoint assignment name an EDS cluster expects, or `None` for other discovery types.
fn eds_service_name(cluster: &Cluster) -> Option<&str> {
    match cluster.cluster_discovery_type {
        Some(ClusterDiscoveryType::Type(t)) if t == DiscoveryType::Eds as i32 => {
            let service_name = cluster
                .eds_cluster_config
                .as_ref()
                .map(|eds| eds.service_name.as_str())
                .filter(|name| !name.is_empty());
            Some(service_name.unwrap_or(cluster.name.as_str()))
        }
        _ => None,
    }
}
