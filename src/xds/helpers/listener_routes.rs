//! Route table references held by Envoy listeners.

use envoy_types::pb::envoy::config::listener::v3::filter::ConfigType;
use envoy_types::pb::envoy::config::listener::v3::{FilterChain, Listener};
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
    http_connection_manager::RouteSpecifier, HttpConnectionManager,
};
use prost::Message;

use crate::xds::resources::HTTP_CONNECTION_MANAGER_FILTER_NAME;
use crate::Result;

/// Names of the route configurations a listener pulls over RDS.
///
/// Inline route configs and scoped routes are self-contained and are not
/// reported. Fails if an HTTP connection manager's typed config cannot be
/// decoded.
pub fn listener_route_names(listener: &Listener) -> Result<Vec<String>> {
    let mut names = Vec::new();

    let chains = listener.filter_chains.iter().chain(listener.default_filter_chain.as_ref());
    for filter_chain in chains {
        collect_rds_names(listener, filter_chain, &mut names)?;
    }

    Ok(names)
}

fn collect_rds_names(
    listener: &Listener,
    filter_chain: &FilterChain,
    names: &mut Vec<String>,
) -> Result<()> {
    for filter in &filter_chain.filters {
        if filter.name != HTTP_CONNECTION_MANAGER_FILTER_NAME {
            continue;
        }
        let Some(ConfigType::TypedConfig(typed_config)) = &filter.config_type else {
            continue;
        };

        let hcm = HttpConnectionManager::decode(&typed_config.value[..]).map_err(|e| {
            crate::Error::internal(format!(
                "Failed to decode HCM for listener '{}': {}",
                listener.name, e
            ))
        })?;

        if let Some(RouteSpecifier::Rds(rds)) = hcm.route_specifier {
            names.push(rds.route_config_name);
        }
    }
    Ok(())
}
