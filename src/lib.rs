//! # Flowplane Sanitizer
//!
//! Snapshot sanitization for the Flowplane Envoy control plane. Translation
//! turns declared upstreams and routes into an xDS snapshot; before that
//! snapshot reaches any proxy, a chain of sanitizers repairs structural
//! defects so that Envoy never receives an update it would reject.
//!
//! ## Architecture
//!
//! ```text
//! ApiSnapshot → Translator → (Snapshot, ResourceReports)
//!                                  ↓
//!                          XdsSanitizers chain
//!                                  ↓
//!                    SnapshotCache (consistency check, deltas)
//!                                  ↓
//!                          discovery streams
//! ```
//!
//! ## Core Components
//!
//! - **Resource graph** ([`xds::Snapshot`]): name-indexed clusters, endpoints,
//!   route configurations and listeners with a content-derived version
//! - **Sanitizer chain** ([`sanitizer::XdsSanitizers`]): ordered, fail-fast
//! - **Route-replacing sanitizer**: points routes at missing upstreams to a
//!   fallback cluster that answers with a configured direct response
//! - **Sync loop** ([`syncer::TranslatorSyncer`]): translate, sanitize, publish
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flowplane_sanitizer::{
//!     sanitizer::XdsSanitizers, syncer::TranslatorSyncer, xds::SnapshotCache, Config, Result,
//! };
//! # use flowplane_sanitizer::{domain::{ApiSnapshot, ResourceReports}, syncer::Translator, xds::Snapshot};
//! # struct MyTranslator;
//! # impl Translator for MyTranslator {
//! #     fn translate(&self, _: &ApiSnapshot) -> Result<(Snapshot, ResourceReports)> {
//! #         Ok((Snapshot::new(), ResourceReports::new()))
//! #     }
//! # }
//!
//! fn main() -> Result<()> {
//!     let config = Config::from_env()?;
//!     flowplane_sanitizer::observability::init_observability(&config.observability)?;
//!
//!     let sanitizers = XdsSanitizers::from_config(&config)?;
//!     let syncer = TranslatorSyncer::new(MyTranslator, sanitizers, Arc::new(SnapshotCache::new()));
//!     syncer.sync("gateway-proxy", &ApiSnapshot::default())?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod sanitizer;
pub mod syncer;
pub mod utils;
pub mod xds;

// Re-export commonly used types and traits
pub use config::Config;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
