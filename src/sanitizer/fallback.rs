//! Fallback cluster and listener
//!
//! The fallback cluster has a single static endpoint: a pipe address on which
//! the fallback listener accepts connections and answers every request with
//! the configured direct response. The listener carries its route table
//! inline, so neither resource references anything outside itself.

use std::sync::Arc;

use envoy_types::pb::envoy::config::cluster::v3::cluster::{ClusterDiscoveryType, DiscoveryType};
use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::core::v3::{
    address::Address as AddressType, data_source, Address, DataSource, Pipe,
};
use envoy_types::pb::envoy::config::endpoint::v3::{
    lb_endpoint::HostIdentifier, ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints,
};
use envoy_types::pb::envoy::config::listener::v3::{filter, Filter, FilterChain, Listener};
use envoy_types::pb::envoy::config::route::v3::{
    route::Action, route_match::PathSpecifier, DirectResponseAction, Route, RouteConfiguration,
    RouteMatch, VirtualHost,
};
use envoy_types::pb::envoy::extensions::filters::http::router::v3::Router;
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
    http_connection_manager::{CodecType, RouteSpecifier},
    http_filter, HttpConnectionManager, HttpFilter,
};
use envoy_types::pb::google::protobuf::Duration;
use validator::Validate;

use crate::config::{FallbackNames, InvalidConfigPolicy};
use crate::xds::resources::{
    any_from_message, HTTP_CONNECTION_MANAGER_FILTER_NAME, HTTP_CONNECTION_MANAGER_TYPE_URL,
    ROUTER_FILTER_NAME, ROUTER_TYPE_URL,
};
use crate::{Error, Result};

/// Default reserved name of the fallback cluster.
///
/// The `:` keeps it outside every name a declared upstream can produce.
pub const FALLBACK_CLUSTER_NAME: &str = "flowplane:fallback_cluster_for_invalid_routes";
/// Default reserved name of the fallback listener.
pub const FALLBACK_LISTENER_NAME: &str = "flowplane:fallback_listener_for_invalid_routes";

const FALLBACK_VIRTUAL_HOST_NAME: &str = "invalid_route_fallback";
const FALLBACK_CONNECT_TIMEOUT_SECS: i64 = 5;

/// Immutable fallback resources built once from policy.
///
/// Shared behind `Arc` so every cycle inserts the same values without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackResources {
    cluster: Arc<Cluster>,
    listener: Arc<Listener>,
}

impl FallbackResources {
    /// Build the fallback cluster and listener.
    ///
    /// Fails with a configuration error when the status code is outside
    /// `[100, 599]` or a name could collide with a user resource.
    pub fn new(policy: &InvalidConfigPolicy, names: &FallbackNames) -> Result<Self> {
        policy.validate().map_err(|e| {
            Error::config(format!("Invalid route replacement policy: {}", e))
        })?;

        names.validate().map_err(|e| {
            Error::config(format!("Invalid fallback resource names: {}", e))
        })?;

        let pipe_path = format!("@{}", names.listener);
        let listener = build_listener(&names.listener, &pipe_path, policy);
        let cluster = build_cluster(&names.cluster, &pipe_path);

        Ok(Self { cluster: Arc::new(cluster), listener: Arc::new(listener) })
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster.name
    }

    pub fn listener_name(&self) -> &str {
        &self.listener.name
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    pub fn listener(&self) -> &Arc<Listener> {
        &self.listener
    }
}

fn pipe_address(path: &str) -> Address {
    Address {
        address: Some(AddressType::Pipe(Pipe { path: path.to_string(), ..Default::default() })),
    }
}

fn build_cluster(name: &str, pipe_path: &str) -> Cluster {
    let endpoint = LbEndpoint {
        host_identifier: Some(HostIdentifier::Endpoint(Endpoint {
            address: Some(pipe_address(pipe_path)),
            ..Default::default()
        })),
        ..Default::default()
    };

    Cluster {
        name: name.to_string(),
        cluster_discovery_type: Some(ClusterDiscoveryType::Type(DiscoveryType::Static as i32)),
        connect_timeout: Some(Duration { seconds: FALLBACK_CONNECT_TIMEOUT_SECS, nanos: 0 }),
        load_assignment: Some(ClusterLoadAssignment {
            cluster_name: name.to_string(),
            endpoints: vec![LocalityLbEndpoints {
                lb_endpoints: vec![endpoint],
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn direct_response(policy: &InvalidConfigPolicy) -> DirectResponseAction {
    let body = (!policy.response_body.is_empty()).then(|| DataSource {
        specifier: Some(data_source::Specifier::InlineString(policy.response_body.clone())),
        ..Default::default()
    });

    DirectResponseAction { status: policy.response_status_code, body, ..Default::default() }
}

fn build_listener(name: &str, pipe_path: &str, policy: &InvalidConfigPolicy) -> Listener {
    let route_config = RouteConfiguration {
        name: format!("{}_routes", name),
        virtual_hosts: vec![VirtualHost {
            name: FALLBACK_VIRTUAL_HOST_NAME.to_string(),
            domains: vec!["*".to_string()],
            routes: vec![Route {
                r#match: Some(RouteMatch {
                    path_specifier: Some(PathSpecifier::Prefix("/".to_string())),
                    ..Default::default()
                }),
                action: Some(Action::DirectResponse(direct_response(policy))),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    };

    let router = HttpFilter {
        name: ROUTER_FILTER_NAME.to_string(),
        config_type: Some(http_filter::ConfigType::TypedConfig(any_from_message(
            ROUTER_TYPE_URL,
            &Router::default(),
        ))),
        ..Default::default()
    };

    let hcm = HttpConnectionManager {
        stat_prefix: name.to_string(),
        codec_type: CodecType::Auto as i32,
        route_specifier: Some(RouteSpecifier::RouteConfig(route_config)),
        http_filters: vec![router],
        ..Default::default()
    };

    Listener {
        name: name.to_string(),
        address: Some(pipe_address(pipe_path)),
        filter_chains: vec![FilterChain {
            filters: vec![Filter {
                name: HTTP_CONNECTION_MANAGER_FILTER_NAME.to_string(),
                config_type: Some(filter::ConfigType::TypedConfig(any_from_message(
                    HTTP_CONNECTION_MANAGER_TYPE_URL,
                    &hcm,
                ))),
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}
