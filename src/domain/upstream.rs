//! Upstream domain types
//!
//! Declared backend services ("upstreams") and the API snapshot the translator
//! consumes. Each upstream maps to exactly one xDS cluster through
//! [`upstream_to_cluster_name`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::utils::is_valid_name;

/// Name/namespace pair identifying a declared object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub name: String,
    pub namespace: String,
}

impl ResourceRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { name: name.into(), namespace: namespace.into() }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A declared backend service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upstream {
    pub metadata: ResourceRef,

    pub spec: UpstreamSpec,

    /// Whether traffic to this upstream should use TLS
    #[serde(default)]
    pub use_tls: bool,
}

impl Upstream {
    /// Create a static upstream with the given hosts
    pub fn static_hosts(metadata: ResourceRef, hosts: Vec<HostPort>) -> Self {
        Self { metadata, spec: UpstreamSpec::Static(StaticUpstream { hosts }), use_tls: false }
    }

    /// Create an upstream backed by a service catalog entry
    pub fn consul(metadata: ResourceRef, consul: ConsulUpstream) -> Self {
        Self { metadata, spec: UpstreamSpec::Consul(consul), use_tls: false }
    }

    /// Cluster name this upstream translates to, if its identifier is well-formed.
    pub fn cluster_name(&self) -> Option<String> {
        upstream_to_cluster_name(&self.metadata)
    }
}

/// How the endpoints of an upstream are discovered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamSpec {
    /// Fixed list of hosts
    Static(StaticUpstream),
    /// Service catalog lookup
    Consul(ConsulUpstream),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticUpstream {
    pub hosts: Vec<HostPort>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPort {
    pub address: String,
    pub port: u16,
}

impl HostPort {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self { address: address.into(), port }
    }
}

/// Catalog-backed upstream definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsulUpstream {
    pub service_name: String,

    /// Datacenters to query; the first one is used
    #[serde(default)]
    pub data_centers: Vec<String>,

    /// Instances must carry all of these tags
    #[serde(default)]
    pub instance_tags: Vec<String>,

    /// Instances must carry none of these tags
    #[serde(default)]
    pub instance_blacklist_tags: Vec<String>,
}

/// Declared intent for one translation cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSnapshot {
    #[serde(default)]
    pub upstreams: Vec<Upstream>,
}

impl ApiSnapshot {
    pub fn new(upstreams: Vec<Upstream>) -> Self {
        Self { upstreams }
    }

    /// Cluster names of every well-formed upstream. Malformed upstreams are
    /// left out, so routes pointing at them count as dangling.
    pub fn cluster_names(&self) -> HashSet<String> {
        self.upstreams.iter().filter_map(Upstream::cluster_name).collect()
    }
}

/// Derive the xDS cluster name for an upstream.
///
/// Returns `None` when either half of the reference breaks the user naming
/// rule. Valid names never contain `.`, so the mapping is injective, and the
/// result can never equal a reserved fallback name.
pub fn upstream_to_cluster_name(upstream: &ResourceRef) -> Option<String> {
    if !is_valid_name(&upstream.name) || !is_valid_name(&upstream.namespace) {
        return None;
    }
    Some(format!("{}.{}", upstream.name, upstream.namespace))
}
