//! # Service Discovery Plugins
//!
//! Discovery plugins own the endpoint side of an upstream type: they can
//! resolve an upstream to a reachable URL and adjust the translated cluster so
//! that its endpoints are served dynamically. The sanitizer never calls them;
//! they sit next to the translator.

pub mod consul;

use async_trait::async_trait;
use envoy_types::pb::envoy::config::cluster::v3::cluster::{
    ClusterDiscoveryType, DiscoveryType, EdsClusterConfig,
};
use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::core::v3::{
    config_source::ConfigSourceSpecifier, AggregatedConfigSource, ApiVersion, ConfigSource,
};
use url::Url;

use crate::domain::Upstream;
use crate::errors::Result;

pub use consul::{
    CatalogService, ConsulCatalog, ConsulPlugin, ConsulSettings, DnsResolver,
    match_tags, mutually_exclusive_tags, DEFAULT_DNS_ADDRESS, DEFAULT_DNS_POLLING_INTERVAL,
    DEFAULT_TLS_TAG_NAME,
};

/// Endpoint discovery for one upstream type.
#[async_trait]
pub trait DiscoveryPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolve an upstream to a URL, `Ok(None)` if the upstream is not of this plugin's type.
    async fn resolve(&self, upstream: &Upstream) -> Result<Option<Url>>;

    /// Adjust the cluster translated from `upstream`. Upstreams of other types are left alone.
    fn process_upstream(&self, upstream: &Upstream, cluster: &mut Cluster) -> Result<()>;
}

/// Switch a cluster to EDS, with endpoints delivered over ADS.
pub fn set_eds_on_cluster(cluster: &mut Cluster) {
    cluster.cluster_discovery_type = Some(ClusterDiscoveryType::Type(DiscoveryType::Eds as i32));
    cluster.eds_cluster_config = Some(EdsClusterConfig {
        eds_config: Some(ConfigSource {
            resource_api_version: ApiVersion::V3 as i32,
            config_source_specifier: Some(ConfigSourceSpecifier::Ads(
                AggregatedConfigSource::default(),
            )),
            ..Default::default()
        }),
        ..Default::default()
    });
}
