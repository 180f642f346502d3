//! Per-node snapshot cache
//!
//! Holds the last published [`Snapshot`] for every proxy node and broadcasts
//! the per-kind differences whenever a new one is accepted. A snapshot that
//! fails [`Snapshot::consistent`] is refused and the previous one keeps being
//! served.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::xds::resources::{built_resources, BuiltResource};
use crate::xds::snapshot::{ResourceKind, Snapshot};
use crate::Result;

/// Changes of a single resource kind.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceDelta {
    pub kind: ResourceKind,
    pub added_or_updated: Vec<BuiltResource>,
    pub removed: Vec<String>,
}

impl ResourceDelta {
    pub fn type_url(&self) -> &'static str {
        self.kind.type_url()
    }

    pub fn is_empty(&self) -> bool {
        self.added_or_updated.is_empty() && self.removed.is_empty()
    }
}

/// Broadcast payload describing everything that changed for one node.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotUpdate {
    pub node_id: String,
    /// Cache-wide, monotonically increasing
    pub version: u64,
    /// Content version of the published snapshot
    pub snapshot_version: String,
    pub deltas: Vec<ResourceDelta>,
}

#[derive(Debug)]
struct CachedSnapshot {
    version: String,
    snapshot: Arc<Snapshot>,
}

/// Snapshot store shared between sync loops and discovery streams.
#[derive(Debug)]
pub struct SnapshotCache {
    version: AtomicU64,
    update_tx: broadcast::Sender<Arc<SnapshotUpdate>>,
    snapshots: RwLock<HashMap<String, CachedSnapshot>>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        let (update_tx, _) = broadcast::channel(128);
        Self { version: AtomicU64::new(1), update_tx, snapshots: RwLock::new(HashMap::new()) }
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    /// Publish `snapshot` for `node_id`.
    ///
    /// Returns `Ok(None)` when the node already holds a snapshot with the same
    /// content version, and an `InconsistentSnapshot` error when the snapshot
    /// has dangling references.
    pub fn set_snapshot(
        &self,
        node_id: &str,
        snapshot: Snapshot,
    ) -> Result<Option<Arc<SnapshotUpdate>>> {
        if let Err(e) = snapshot.consistent() {
            warn!(node_id, error = %e, "Refusing inconsistent snapshot");
            return Err(e);
        }

        let snapshot_version = snapshot.version();
        let mut snapshots = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);

        let previous = snapshots.get(node_id);
        if previous.is_some_and(|cached| cached.version == snapshot_version) {
            debug!(node_id, version = %snapshot_version, "Snapshot unchanged, skipping publish");
            return Ok(None);
        }

        let empty = Snapshot::new();
        let old = previous.map(|cached| cached.snapshot.as_ref()).unwrap_or(&empty);
        let deltas: Vec<ResourceDelta> = ResourceKind::ALL
            .into_iter()
            .map(|kind| diff_kind(kind, old, &snapshot))
            .filter(|delta| !delta.is_empty())
            .collect();

        let new_version = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        snapshots.insert(
            node_id.to_string(),
            CachedSnapshot { version: snapshot_version.clone(), snapshot: Arc::new(snapshot) },
        );
        drop(snapshots);

        info!(
            node_id,
            version = new_version,
            snapshot_version = %snapshot_version,
            changed_kinds = deltas.len(),
            "Published snapshot"
        );

        let update = Arc::new(SnapshotUpdate {
            node_id: node_id.to_string(),
            version: new_version,
            snapshot_version,
            deltas,
        });

        let _ = self.update_tx.send(update.clone());
        Ok(Some(update))
    }

    /// Last published snapshot for a node.
    pub fn snapshot(&self, node_id: &str) -> Option<Arc<Snapshot>> {
        let snapshots = self.snapshots.read().unwrap_or_else(PoisonError::into_inner);
        snapshots.get(node_id).map(|cached| cached.snapshot.clone())
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<Arc<SnapshotUpdate>> {
        self.update_tx.subscribe()
    }

    /// Forget a node's snapshot. Returns whether one was held.
    pub fn clear(&self, node_id: &str) -> bool {
        let mut snapshots = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);
        snapshots.remove(node_id).is_some()
    }

    pub fn node_ids(&self) -> Vec<String> {
        let snapshots = self.snapshots.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = snapshots.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn diff_kind(kind: ResourceKind, old: &Snapshot, new: &Snapshot) -> ResourceDelta {
    let previous: HashMap<String, BuiltResource> = built_resources(kind, old)
        .into_iter()
        .map(|built| (built.name.clone(), built))
        .collect();

    let incoming = built_resources(kind, new);

    let removed: Vec<String> = old
        .names(kind)
        .into_iter()
        .filter(|name| !new.contains(kind, name))
        .collect();

    let added_or_updated: Vec<BuiltResource> = incoming
        .into_iter()
        .filter(|built| match previous.get(&built.name) {
            Some(existing) => existing.resource != built.resource,
            None => true,
        })
        .collect();

    ResourceDelta { kind, added_or_updated, removed }
}
