//! Property tests for the route-replacing sanitizer over generated route tables.

use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::route::v3::{
    route::Action, route_action::ClusterSpecifier, weighted_cluster::ClusterWeight, Route,
    RouteAction, RouteConfiguration, VirtualHost, WeightedCluster,
};
use envoy_types::pb::google::protobuf::UInt32Value;
use proptest::prelude::*;

use flowplane_sanitizer::config::{FallbackNames, InvalidConfigPolicy};
use flowplane_sanitizer::domain::{
    ApiSnapshot, Diagnostic, HostPort, ReportKey, ResourceReports, ResourceRef, Upstream,
};
use flowplane_sanitizer::sanitizer::{
    RouteReplacingSanitizer, SanitizeContext, XdsSanitizer, FALLBACK_CLUSTER_NAME,
};
use flowplane_sanitizer::xds::{cluster_references, Snapshot};

/// Declared upstream names; `ghost*` clusters are never declared.
const DECLARED: [&str; 3] = ["alpha", "beta", "gamma"];
const CANDIDATES: [&str; 6] = ["alpha.ns", "beta.ns", "gamma.ns", "ghost.ns", "ghost2.ns", "x"];

#[derive(Debug, Clone)]
enum RouteShape {
    Single(String),
    Weighted(Vec<(String, u32)>),
    NoCluster,
}

fn cluster_name() -> impl Strategy<Value = String> {
    prop::sample::select(CANDIDATES.to_vec()).prop_map(str::to_string)
}

fn route_shape() -> impl Strategy<Value = RouteShape> {
    prop_oneof![
        cluster_name().prop_map(RouteShape::Single),
        prop::collection::vec((cluster_name(), 0u32..100), 0..5).prop_map(RouteShape::Weighted),
        Just(RouteShape::NoCluster),
    ]
}

fn build_route(shape: &RouteShape) -> Route {
    let specifier = match shape {
        RouteShape::Single(name) => Some(ClusterSpecifier::Cluster(name.clone())),
        RouteShape::Weighted(entries) => Some(ClusterSpecifier::WeightedClusters(WeightedCluster {
            clusters: entries
                .iter()
                .map(|(name, weight)| ClusterWeight {
                    name: name.clone(),
                    weight: Some(UInt32Value { value: *weight }),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })),
        RouteShape::NoCluster => None,
    };

    Route {
        action: specifier.map(|cluster_specifier| {
            Action::Route(RouteAction { cluster_specifier: Some(cluster_specifier), ..Default::default() })
        }),
        ..Default::default()
    }
}

fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    prop::collection::vec(prop::collection::vec(route_shape(), 0..6), 0..4).prop_map(|tables| {
        let routes = tables.iter().enumerate().map(|(i, shapes)| RouteConfiguration {
            name: format!("routes-{}", i),
            virtual_hosts: vec![VirtualHost {
                name: "vh".to_string(),
                routes: shapes.iter().map(build_route).collect(),
                ..Default::default()
            }],
            ..Default::default()
        });

        Snapshot::new()
            .with_clusters(DECLARED.iter().map(|name| Cluster {
                name: format!("{}.ns", name),
                ..Default::default()
            }))
            .with_routes(routes)
    })
}

fn api() -> ApiSnapshot {
    ApiSnapshot::new(
        DECLARED
            .iter()
            .map(|name| {
                Upstream::static_hosts(ResourceRef::new(*name, "ns"), vec![HostPort::new("10.0.0.1", 80)])
            })
            .collect(),
    )
}

fn flagged() -> ResourceReports {
    let mut reports = ResourceReports::new();
    reports.add_warning(
        ReportKey::proxy(ResourceRef::new("proxy", "ns")),
        Diagnostic::missing_upstream("route 'r' points at missing upstream ghost.ns"),
    );
    reports
}

fn sanitizer() -> RouteReplacingSanitizer {
    RouteReplacingSanitizer::new(&InvalidConfigPolicy::replacing(500, ""), &FallbackNames::default())
        .expect("valid policy")
}

fn run(snapshot: &Snapshot, reports: &ResourceReports) -> Snapshot {
    sanitizer()
        .sanitize_snapshot(&SanitizeContext::new("node"), &api(), snapshot, reports)
        .expect("route replacement never fails")
}

fn all_references(snapshot: &Snapshot) -> Vec<Vec<String>> {
    snapshot
        .routes
        .iter()
        .map(|(_, rc)| cluster_references(rc).map(str::to_string).collect())
        .collect()
}

proptest! {
    #[test]
    fn sanitizing_twice_equals_sanitizing_once(snapshot in snapshot_strategy()) {
        let once = run(&snapshot, &flagged());
        let twice = run(&once, &flagged());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn unflagged_snapshots_pass_through(snapshot in snapshot_strategy()) {
        let mut reports = ResourceReports::new();
        reports.add_warning(ReportKey::proxy(ResourceRef::new("proxy", "ns")), "weird header");
        prop_assert_eq!(run(&snapshot, &reports), snapshot);
    }

    #[test]
    fn every_reference_resolves_after_repair(snapshot in snapshot_strategy()) {
        let output = run(&snapshot, &flagged());
        for (_, route_config) in output.routes.iter() {
            for cluster in cluster_references(route_config) {
                prop_assert!(output.clusters.contains(cluster), "dangling {}", cluster);
            }
        }
        prop_assert!(output.consistent().is_ok());
    }

    #[test]
    fn references_are_replaced_in_place(snapshot in snapshot_strategy()) {
        let valid = api().cluster_names();
        let before = all_references(&snapshot);
        let after = all_references(&run(&snapshot, &flagged()));

        prop_assert_eq!(before.len(), after.len());
        for (old, new) in before.iter().zip(after.iter()) {
            prop_assert_eq!(old.len(), new.len());
            for (o, n) in old.iter().zip(new.iter()) {
                if valid.contains(o) {
                    prop_assert_eq!(o, n);
                } else {
                    prop_assert_eq!(n.as_str(), FALLBACK_CLUSTER_NAME);
                }
            }
        }
    }
}

#[test]
fn weighted_order_and_weights_are_preserved() {
    let shape = RouteShape::Weighted(vec![
        ("alpha.ns".to_string(), 1),
        ("ghost.ns".to_string(), 2),
        ("gamma.ns".to_string(), 3),
    ]);
    let snapshot = Snapshot::new().with_routes([RouteConfiguration {
        name: "routes".to_string(),
        virtual_hosts: vec![VirtualHost { routes: vec![build_route(&shape)], ..Default::default() }],
        ..Default::default()
    }]);

    let output = run(&snapshot, &flagged());
    let rc = output.routes.get("routes").unwrap();
    let Some(Action::Route(RouteAction {
        cluster_specifier: Some(ClusterSpecifier::WeightedClusters(wc)),
        ..
    })) = &rc.virtual_hosts[0].routes[0].action
    else {
        panic!("expected weighted clusters");
    };

    let entries: Vec<_> = wc
        .clusters
        .iter()
        .map(|cw| (cw.name.as_str(), cw.weight.as_ref().map(|w| w.value)))
        .collect();
    assert_eq!(
        entries,
        vec![("alpha.ns", Some(1)), (FALLBACK_CLUSTER_NAME, Some(2)), ("gamma.ns", Some(3))]
    );
}
