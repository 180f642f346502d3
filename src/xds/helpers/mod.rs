//! Helper utilities for xDS resource manipulation.
//!
//! Reusable abstractions for walking and rewriting the references that tie
//! listeners, route configurations and clusters together.

mod listener_routes;
mod route_modifier;

pub use listener_routes::listener_route_names;
pub use route_modifier::{cluster_references, ReferenceSite, RouteConfigModifier};
