//! Domain layer
//!
//! Declared intent and translator diagnostics, the two read-only inputs the
//! sanitizer chain receives alongside the xDS snapshot.
//!
//! ## Module Organization
//!
//! - `upstream`: declared upstreams, the API snapshot and the upstream → cluster naming function
//! - `report`: typed diagnostics and per-object reports produced during translation

pub mod report;
pub mod upstream;

pub use report::{
    Diagnostic, DiagnosticCode, ObjectKind, Report, ReportKey, ResourceReports,
    MISSING_UPSTREAM_MARKER,
};
pub use upstream::{
    upstream_to_cluster_name, ApiSnapshot, ConsulUpstream, HostPort, ResourceRef,
    StaticUpstream, Upstream, UpstreamSpec,
};
