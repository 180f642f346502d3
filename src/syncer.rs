//! # Translation Sync Loop
//!
//! One cycle translates the declared intent into a snapshot, runs the
//! sanitizer chain over it and hands the result to the [`SnapshotCache`].
//! Any failure aborts the cycle and the previously published snapshot keeps
//! being served.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::{ApiSnapshot, ResourceReports};
use crate::observability::metrics::{record_sync_cycle, Outcome};
use crate::sanitizer::{SanitizeContext, XdsSanitizers};
use crate::xds::{Snapshot, SnapshotCache};
use crate::Result;

/// Produces an xDS snapshot and diagnostics from declared intent.
pub trait Translator: Send + Sync {
    fn translate(&self, api: &ApiSnapshot) -> Result<(Snapshot, ResourceReports)>;
}

/// Result of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Content version of the sanitized snapshot
    pub version: String,
    /// False when the node already held identical content
    pub published: bool,
}

pub struct TranslatorSyncer<T> {
    translator: T,
    sanitizers: XdsSanitizers,
    cache: Arc<SnapshotCache>,
}

impl<T: Translator> TranslatorSyncer<T> {
    pub fn new(translator: T, sanitizers: XdsSanitizers, cache: Arc<SnapshotCache>) -> Self {
        Self { translator, sanitizers, cache }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }

    /// Run one translate → sanitize → publish cycle for `node_id`.
    pub fn sync(&self, node_id: &str, api: &ApiSnapshot) -> Result<SyncOutcome> {
        let span = crate::sync_span!(node_id, upstreams = api.upstreams.len());
        let _guard = span.enter();

        match self.run_cycle(node_id, api) {
            Ok(outcome) => {
                span.record("version", outcome.version.as_str());
                let label = if outcome.published { Outcome::Published } else { Outcome::Unchanged };
                record_sync_cycle(label);
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, "Sync cycle failed, keeping previous snapshot");
                record_sync_cycle(Outcome::Failed);
                Err(e)
            }
        }
    }

    fn run_cycle(&self, node_id: &str, api: &ApiSnapshot) -> Result<SyncOutcome> {
        let (snapshot, reports) = self.translator.translate(api)?;

        if reports.error_count() > 0 {
            warn!(
                errors = reports.error_count(),
                warnings = reports.warning_count(),
                "Translation reported errors"
            );
        }

        let ctx = SanitizeContext::new(node_id);
        let sanitized = self.sanitizers.sanitize_snapshot(&ctx, api, &snapshot, &reports)?;

        let version = sanitized.version();
        let update = self.cache.set_snapshot(node_id, sanitized)?;
        let published = update.is_some();

        info!(
            cycle_id = %ctx.cycle_id,
            version = %version,
            published,
            "Sync cycle complete"
        );

        Ok(SyncOutcome { version, published })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ReportKey, ResourceRef};
    use crate::Error;
    use envoy_types::pb::envoy::config::cluster::v3::Cluster;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    /// Returns queued results in order.
    struct ScriptedTranslator(Mutex<Vec<Result<(Snapshot, ResourceReports)>>>);

    impl ScriptedTranslator {
        fn new(mut results: Vec<Result<(Snapshot, ResourceReports)>>) -> Self {
            results.reverse();
            Self(Mutex::new(results))
        }
    }

    impl Translator for ScriptedTranslator {
        fn translate(&self, _api: &ApiSnapshot) -> Result<(Snapshot, ResourceReports)> {
            self.0.lock().unwrap().pop().unwrap_or_else(|| Err(Error::internal("script exhausted")))
        }
    }

    fn clusters(names: &[&str]) -> Snapshot {
        Snapshot::new()
            .with_clusters(names.iter().map(|n| Cluster { name: n.to_string(), ..Default::default() }))
    }

    #[test]
    #[traced_test]
    fn test_failed_translation_keeps_previous_snapshot() {
        let cache = Arc::new(SnapshotCache::new());
        let syncer = TranslatorSyncer::new(
            ScriptedTranslator::new(vec![
                Ok((clusters(&["a"]), ResourceReports::new())),
                Err(Error::internal("translator exploded")),
            ]),
            XdsSanitizers::new(),
            cache.clone(),
        );

        let first = syncer.sync("node-1", &ApiSnapshot::default()).unwrap();
        assert!(first.published);

        let err = syncer.sync("node-1", &ApiSnapshot::default()).unwrap_err();
        assert!(err.to_string().contains("translator exploded"));

        let served = cache.snapshot("node-1").expect("previous snapshot");
        assert_eq!(served.version(), first.version);
        assert!(logs_contain("Sync cycle failed"));
    }

    #[test]
    fn test_unchanged_content_is_not_republished() {
        let syncer = TranslatorSyncer::new(
            ScriptedTranslator::new(vec![
                Ok((clusters(&["a"]), ResourceReports::new())),
                Ok((clusters(&["a"]), ResourceReports::new())),
            ]),
            XdsSanitizers::new(),
            Arc::new(SnapshotCache::new()),
        );

        let first = syncer.sync("node-1", &ApiSnapshot::default()).unwrap();
        let second = syncer.sync("node-1", &ApiSnapshot::default()).unwrap();
        assert!(first.published);
        assert!(!second.published);
        assert_eq!(first.version, second.version);
    }

    #[test]
    #[traced_test]
    fn test_report_errors_do_not_abort() {
        let mut reports = ResourceReports::new();
        reports.add_error(ReportKey::upstream(ResourceRef::new("u", "ns")), "bad upstream spec");

        let syncer = TranslatorSyncer::new(
            ScriptedTranslator::new(vec![Ok((clusters(&["a"]), reports))]),
            XdsSanitizers::new(),
            Arc::new(SnapshotCache::new()),
        );

        assert!(syncer.sync("node-1", &ApiSnapshot::default()).unwrap().published);
        assert!(logs_contain("Translation reported errors"));
    }
}
