//! Envoy resource encoding
//!
//! Type URLs and the `BuiltResource` wrapper used to hand snapshot contents
//! to a discovery stream.

use envoy_types::pb::google::protobuf::Any;
use prost::Message;
use tracing::debug;

use crate::xds::snapshot::{NamedResource, ResourceKind, Resources, Snapshot};

pub const CLUSTER_TYPE_URL: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
pub const ENDPOINT_TYPE_URL: &str =
    "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";
pub const ROUTE_TYPE_URL: &str = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
pub const LISTENER_TYPE_URL: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";

pub const HTTP_CONNECTION_MANAGER_FILTER_NAME: &str =
    "envoy.filters.network.http_connection_manager";
pub const HTTP_CONNECTION_MANAGER_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager";

/// Envoy's canonical router filter name
pub const ROUTER_FILTER_NAME: &str = "envoy.filters.http.router";
pub const ROUTER_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.http.router.v3.Router";

/// Wrapper for a built Envoy resource along with its name.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltResource {
    pub name: String,
    pub resource: Any,
}

impl BuiltResource {
    pub fn into_any(self) -> Any {
        self.resource
    }

    pub fn type_url(&self) -> &str {
        &self.resource.type_url
    }
}

/// Wrap a protobuf message into an `Any` with the given type URL.
pub fn any_from_message<M: Message>(type_url: &str, message: &M) -> Any {
    Any { type_url: type_url.to_string(), value: message.encode_to_vec() }
}

fn build_all<T: NamedResource>(resources: &Resources<T>) -> Vec<BuiltResource> {
    let type_url = T::KIND.type_url();
    let mut total_bytes = 0;

    let built: Vec<BuiltResource> = resources
        .iter()
        .map(|(name, resource)| {
            let any = any_from_message(type_url, resource);
            total_bytes += any.value.len();
            BuiltResource { name: name.to_string(), resource: any }
        })
        .collect();

    if !built.is_empty() {
        debug!(type_url, count = built.len(), total_bytes, "Encoded snapshot resources");
    }

    built
}

/// Encode one kind bucket of a snapshot, ordered by resource name.
pub fn built_resources(kind: ResourceKind, snapshot: &Snapshot) -> Vec<BuiltResource> {
    match kind {
        ResourceKind::Cluster => build_all(&snapshot.clusters),
        ResourceKind::Endpoint => build_all(&snapshot.endpoints),
        ResourceKind::Route => build_all(&snapshot.routes),
        ResourceKind::Listener => build_all(&snapshot.listeners),
    }
}
