//! Catalog-backed discovery plugin
//!
//! Resolves catalog upstreams by asking the service catalog for instances of
//! the service and picking the first one whose tags match the upstream's tag
//! filters. Catalog clusters are served over EDS.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use tracing::{debug, info};
use url::Url;

use crate::discovery::{set_eds_on_cluster, DiscoveryPlugin};
use crate::domain::{ResourceRef, Upstream, UpstreamSpec};
use crate::errors::{Error, Result};

pub const DEFAULT_DNS_ADDRESS: &str = "127.0.0.1:8600";
pub const DEFAULT_DNS_POLLING_INTERVAL: Duration = Duration::from_secs(5);
/// Instance tag marking a catalog service as TLS-only, namespaced to this control plane.
pub const DEFAULT_TLS_TAG_NAME: &str = "flowplaneUseTls";

/// One registered instance of a catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogService {
    pub service_name: String,
    /// IP address or hostname
    pub service_address: String,
    pub service_port: u16,
    pub service_tags: Vec<String>,
    pub datacenter: String,
}

/// Read access to the service catalog.
#[async_trait]
pub trait ConsulCatalog: Send + Sync {
    /// Instances of `service_name`, optionally restricted to one datacenter.
    async fn service(
        &self,
        service_name: &str,
        datacenter: Option<&str>,
    ) -> Result<Vec<CatalogService>>;
}

/// Hostname resolution for instances registered by name.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>>;
}

/// Catalog settings supplied at init.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsulSettings {
    pub dns_address: String,
    /// Mark instances carrying `tls_tag_name` as TLS upstreams
    pub use_tls_tagging: bool,
    pub tls_tag_name: String,
    /// Secret holding the root CA for TLS-tagged instances
    pub root_ca: Option<ResourceRef>,
}

impl Default for ConsulSettings {
    fn default() -> Self {
        Self {
            dns_address: DEFAULT_DNS_ADDRESS.to_string(),
            use_tls_tagging: false,
            tls_tag_name: DEFAULT_TLS_TAG_NAME.to_string(),
            root_ca: None,
        }
    }
}

pub struct ConsulPlugin {
    catalog: Arc<dyn ConsulCatalog>,
    resolver: Arc<dyn DnsResolver>,
    dns_polling_interval: Duration,
    settings: ConsulSettings,
}

impl ConsulPlugin {
    pub const NAME: &'static str = "consul";

    pub fn new(
        catalog: Arc<dyn ConsulCatalog>,
        resolver: Arc<dyn DnsResolver>,
        dns_polling_interval: Option<Duration>,
    ) -> Self {
        Self {
            catalog,
            resolver,
            dns_polling_interval: dns_polling_interval.unwrap_or(DEFAULT_DNS_POLLING_INTERVAL),
            settings: ConsulSettings::default(),
        }
    }

    /// Apply catalog settings.
    ///
    /// TLS tagging needs a root CA reference with both name and namespace set.
    pub fn init(&mut self, mut settings: ConsulSettings) -> Result<()> {
        if settings.use_tls_tagging {
            let root_ca_complete = settings
                .root_ca
                .as_ref()
                .is_some_and(|ca| !ca.name.is_empty() && !ca.namespace.is_empty());
            if !root_ca_complete {
                return Err(Error::config(format!(
                    "Consul settings enable TLS tagging, but the root CA name/namespace are not set: {:?}",
                    settings.root_ca
                )));
            }
            if settings.tls_tag_name.is_empty() {
                settings.tls_tag_name = DEFAULT_TLS_TAG_NAME.to_string();
            }
        }

        info!(
            dns_address = %settings.dns_address,
            use_tls_tagging = settings.use_tls_tagging,
            "Consul discovery initialized"
        );
        self.settings = settings;
        Ok(())
    }

    pub fn settings(&self) -> &ConsulSettings {
        &self.settings
    }

    pub fn dns_polling_interval(&self) -> Duration {
        self.dns_polling_interval
    }

    async fn ip_addresses(&self, address: &str) -> Result<Vec<IpAddr>> {
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        self.resolver.resolve(address).await
    }
}

#[async_trait]
impl DiscoveryPlugin for ConsulPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn resolve(&self, upstream: &Upstream) -> Result<Option<Url>> {
        let UpstreamSpec::Consul(spec) = &upstream.spec else {
            return Ok(None);
        };

        let datacenter = spec.data_centers.first().map(String::as_str);
        let instances = self.catalog.service(&spec.service_name, datacenter).await.map_err(|e| {
            Error::discovery(format!("getting service '{}' from catalog: {}", spec.service_name, e))
        })?;

        let scheme = if upstream.use_tls { "https" } else { "http" };

        for instance in &instances {
            let tags_match = spec.instance_tags.is_empty()
                || match_tags(&spec.instance_tags, &instance.service_tags);
            let not_blacklisted = spec.instance_blacklist_tags.is_empty()
                || mutually_exclusive_tags(&spec.instance_blacklist_tags, &instance.service_tags);
            if !(tags_match && not_blacklisted) {
                continue;
            }

            let addresses = self.ip_addresses(&instance.service_address).await?;
            let Some(ip) = addresses.first() else {
                return Err(Error::discovery(format!(
                    "DNS result for {} returned an empty list of IPs",
                    instance.service_address
                )));
            };

            let host = match ip {
                IpAddr::V4(v4) => v4.to_string(),
                IpAddr::V6(v6) => format!("[{}]", v6),
            };
            let url = Url::parse(&format!("{}://{}:{}", scheme, host, instance.service_port))
                .map_err(|e| Error::discovery(format!("invalid instance address: {}", e)))?;

            debug!(upstream = %upstream.metadata, %url, "Resolved catalog upstream");
            return Ok(Some(url));
        }

        Err(Error::discovery(format!(
            "service with name {} and tags {:?} not found",
            spec.service_name, spec.instance_tags
        )))
    }

    fn process_upstream(&self, upstream: &Upstream, cluster: &mut Cluster) -> Result<()> {
        if matches!(upstream.spec, UpstreamSpec::Consul(_)) {
            set_eds_on_cluster(cluster);
        }
        Ok(())
    }
}

/// True if every tag in `required` is present in `tags`.
pub fn match_tags(required: &[String], tags: &[String]) -> bool {
    if required.len() > tags.len() {
        return false;
    }
    required.iter().all(|tag| tags.contains(tag))
}

/// True if `a` and `b` share no tag.
pub fn mutually_exclusive_tags(a: &[String], b: &[String]) -> bool {
    !a.iter().any(|tag| b.contains(tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConsulUpstream, HostPort};
    use envoy_types::pb::envoy::config::cluster::v3::cluster::{
        ClusterDiscoveryType, DiscoveryType,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCatalog {
        services: HashMap<String, Vec<CatalogService>>,
        queried_datacenters: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl ConsulCatalog for FakeCatalog {
        async fn service(
            &self,
            service_name: &str,
            datacenter: Option<&str>,
        ) -> Result<Vec<CatalogService>> {
            self.queried_datacenters.lock().unwrap().push(datacenter.map(str::to_string));
            Ok(self.services.get(service_name).cloned().unwrap_or_default())
        }
    }

    struct FakeResolver(HashMap<String, Vec<IpAddr>>);

    #[async_trait]
    impl DnsResolver for FakeResolver {
        async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
            Ok(self.0.get(host).cloned().unwrap_or_default())
        }
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn instance(address: &str, port: u16, instance_tags: &[&str]) -> CatalogService {
        CatalogService {
            service_name: "billing".to_string(),
            service_address: address.to_string(),
            service_port: port,
            service_tags: tags(instance_tags),
            datacenter: "dc1".to_string(),
        }
    }

    fn upstream(instance_tags: &[&str], blacklist: &[&str]) -> Upstream {
        Upstream::consul(
            ResourceRef::new("billing", "prod"),
            ConsulUpstream {
                service_name: "billing".to_string(),
                data_centers: tags(&["dc1", "dc2"]),
                instance_tags: tags(instance_tags),
                instance_blacklist_tags: tags(blacklist),
            },
        )
    }

    fn build_plugin(instances: Vec<CatalogService>) -> (ConsulPlugin, Arc<FakeCatalog>) {
        let catalog = Arc::new(FakeCatalog {
            services: HashMap::from([("billing".to_string(), instances)]),
            ..Default::default()
        });
        let resolver = Arc::new(FakeResolver(HashMap::from([
            ("billing.service.consul".to_string(), vec!["10.1.2.3".parse().unwrap()]),
            ("empty.service.consul".to_string(), Vec::new()),
        ])));
        (ConsulPlugin::new(catalog.clone(), resolver, None), catalog)
    }

    #[tokio::test]
    async fn test_resolve_picks_first_matching_instance() {
        let (plugin, catalog) = build_plugin(vec![
            instance("10.0.0.1", 8080, &["v1"]),
            instance("10.0.0.2", 8081, &["v2", "canary"]),
            instance("10.0.0.3", 8082, &["v2"]),
        ]);

        let url = plugin.resolve(&upstream(&["v2"], &["canary"])).await.unwrap().unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.3:8082/");
        assert_eq!(*catalog.queried_datacenters.lock().unwrap(), vec![Some("dc1".to_string())]);
    }

    #[tokio::test]
    async fn test_resolve_uses_dns_and_tls_scheme() {
        let (plugin, _) = build_plugin(vec![instance("billing.service.consul", 8443, &[])]);
        let mut tls_upstream = upstream(&[], &[]);
        tls_upstream.use_tls = true;

        let url = plugin.resolve(&tls_upstream).await.unwrap().unwrap();
        assert_eq!(url.as_str(), "https://10.1.2.3:8443/");
    }

    #[tokio::test]
    async fn test_resolve_errors() {
        let (plugin, _) = build_plugin(vec![instance("empty.service.consul", 80, &[])]);
        let err = plugin.resolve(&upstream(&[], &[])).await.unwrap_err();
        assert!(err.to_string().contains("empty list of IPs"));

        let (plugin, _) = build_plugin(vec![instance("10.0.0.1", 80, &["v1"])]);
        let err = plugin.resolve(&upstream(&["v9"], &[])).await.unwrap_err();
        assert!(matches!(err, Error::Discovery(_)));
        assert!(err.to_string().contains("service with name billing"));
    }

    #[tokio::test]
    async fn test_other_upstream_types_are_ignored() {
        let (plugin, _) = build_plugin(Vec::new());
        let static_upstream = Upstream::static_hosts(
            ResourceRef::new("web", "prod"),
            vec![HostPort::new("10.0.0.1", 80)],
        );
        assert!(plugin.resolve(&static_upstream).await.unwrap().is_none());

        let mut cluster = Cluster::default();
        plugin.process_upstream(&static_upstream, &mut cluster).unwrap();
        assert_eq!(cluster, Cluster::default());

        plugin.process_upstream(&upstream(&[], &[]), &mut cluster).unwrap();
        assert_eq!(
            cluster.cluster_discovery_type,
            Some(ClusterDiscoveryType::Type(DiscoveryType::Eds as i32))
        );
    }

    #[test]
    fn test_init_requires_root_ca_for_tls_tagging() {
        let (mut plugin, _) = build_plugin(Vec::new());
        assert_eq!(plugin.dns_polling_interval(), DEFAULT_DNS_POLLING_INTERVAL);

        let err = plugin
            .init(ConsulSettings {
                use_tls_tagging: true,
                root_ca: Some(ResourceRef::new("ca", "")),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.is_fatal());

        plugin
            .init(ConsulSettings {
                use_tls_tagging: true,
                tls_tag_name: String::new(),
                root_ca: Some(ResourceRef::new("ca", "flowplane-system")),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(plugin.settings().tls_tag_name, DEFAULT_TLS_TAG_NAME);
    }

    #[test]
    fn test_tag_helpers() {
        assert!(match_tags(&tags(&["a"]), &tags(&["a", "b"])));
        assert!(!match_tags(&tags(&["a", "c"]), &tags(&["a", "b"])));
        assert!(!match_tags(&tags(&["a", "b", "c"]), &tags(&["a", "b"])));
        assert!(mutually_exclusive_tags(&tags(&["x"]), &tags(&["a", "b"])));
        assert!(!mutually_exclusive_tags(&tags(&["b"]), &tags(&["a", "b"])));
    }
}
