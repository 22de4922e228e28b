//! Per-zone state capture for override restore

use nuvo_protocol::ZoneId;
use nuvo_state::ZoneState;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// One captured zone state
///
/// Snapshots are session-lived and never persisted. Restoring does not
/// consume the snapshot, so repeated restores reproduce the same target
/// state until a new capture overwrites it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub zone: ZoneId,
    pub state: ZoneState,
    pub captured_at: Instant,
}

/// Last-wins store of at most one snapshot per zone
#[derive(Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<HashMap<ZoneId, Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a zone's state, replacing any previous snapshot for it
    pub fn capture(&self, state: ZoneState) -> Snapshot {
        let snapshot = Snapshot {
            zone: state.zone,
            state,
            captured_at: Instant::now(),
        };
        self.inner.write().insert(snapshot.zone, snapshot.clone());
        snapshot
    }

    /// The live snapshot for a zone, if one was captured this session
    pub fn get(&self, zone: ZoneId) -> Option<Snapshot> {
        self.inner.read().get(&zone).cloned()
    }
}
