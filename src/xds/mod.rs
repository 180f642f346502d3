//! Envoy xDS resource graph
//!
//! - `snapshot`: the name-indexed, versioned set of resources for one proxy
//! - `helpers`: walking and rewriting cross-resource references
//! - `resources`: type URLs and `Any` encoding for distribution
//! - `cache`: per-node snapshot store with delta broadcast

pub mod cache;
pub mod helpers;
pub mod resources;
pub mod snapshot;

pub use cache::{ResourceDelta, SnapshotCache, SnapshotUpdate};
pub use helpers::{cluster_references, listener_route_names, RouteConfigModifier};
pub use resources::{built_resources, BuiltResource};
pub use snapshot::{NamedResource, ResourceKind, Resources, Snapshot};
