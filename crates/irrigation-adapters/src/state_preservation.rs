//! Multi-tier state preservation for control-mode transitions, grounded on
//! the original `state_preservation.py`: an in-memory fast tier, a durable
//! tier (pluggable — Redis/Postgres in the original, any [`SnapshotStore`]
//! implementation here), and a local file backup, each a fallback for the
//! one before it on restore. Snapshots carry a SHA-256 checksum over the
//! serialized body; a mismatch on restore produces a verification warning
//! rather than silently trusting corrupted data (SPEC_FULL.md §C.2).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use irrigation_core::{ControlMode, GateId, NodeId, Warning};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionType {
    AutoToManual,
    ManualToAuto,
    NormalToEmergency,
    EmergencyToNormal,
    MaintenanceStart,
    MaintenanceEnd,
    PartialFailure,
    SystemRecovery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStateSnapshot {
    pub snapshot_id: Uuid,
    pub transition_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub transition_type: TransitionType,
    pub trigger_reason: String,
    pub gate_control_modes: HashMap<GateId, ControlMode>,
    pub gate_openings_m: HashMap<GateId, f64>,
    pub water_levels_m: HashMap<NodeId, f64>,
    pub preserved_by: String,
    pub checksum: String,
}

fn checksum_body(
    gate_control_modes: &HashMap<GateId, ControlMode>,
    gate_openings_m: &HashMap<GateId, f64>,
    water_levels_m: &HashMap<NodeId, f64>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(gate_control_modes).unwrap_or_default());
    hasher.update(serde_json::to_vec(gate_openings_m).unwrap_or_default());
    hasher.update(serde_json::to_vec(water_levels_m).unwrap_or_default());
    format!("{:x}", hasher.finalize())
}

impl SystemStateSnapshot {
    pub fn new(
        transition_type: TransitionType,
        trigger_reason: String,
        gate_control_modes: HashMap<GateId, ControlMode>,
        gate_openings_m: HashMap<GateId, f64>,
        water_levels_m: HashMap<NodeId, f64>,
        preserved_by: String,
    ) -> Self {
        let checksum = checksum_body(&gate_control_modes, &gate_openings_m, &water_levels_m);
        Self {
            snapshot_id: Uuid::new_v4(),
            transition_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            transition_type,
            trigger_reason,
            gate_control_modes,
            gate_openings_m,
            water_levels_m,
            preserved_by,
            checksum,
        }
    }

    fn verify(&self) -> bool {
        self.checksum == checksum_body(&self.gate_control_modes, &self.gate_openings_m, &self.water_levels_m)
    }
}

#[derive(Debug, Clone)]
pub struct StateRestoreResult {
    pub success: bool,
    pub transition_id: Uuid,
    pub warnings: Vec<Warning>,
}

/// The durable tier behind the fast LRU cache — a Redis/Postgres client in
/// the original, a local-file repository by default here, swappable for any
/// real backing store without changing [`StatePreservation`]'s call sites.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put(&self, snapshot: &SystemStateSnapshot) -> irrigation_core::Result<()>;
    async fn get_by_transition(&self, transition_id: Uuid) -> irrigation_core::Result<Option<SystemStateSnapshot>>;
}

/// Local-filesystem backup tier, the "file backup" fallback in the
/// original's `_retrieve_snapshot` chain (Redis -> Postgres -> file).
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, snapshot_id: Uuid) -> PathBuf {
        self.dir.join(format!("{snapshot_id}.json"))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn put(&self, snapshot: &SystemStateSnapshot) -> irrigation_core::Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| irrigation_core::CoreError::Fatal(e.to_string()))?;
        let body = serde_json::to_vec_pretty(snapshot)?;
        std::fs::write(self.path_for(snapshot.snapshot_id), body).map_err(|e| irrigation_core::CoreError::Fatal(e.to_string()))
    }

    async fn get_by_transition(&self, transition_id: Uuid) -> irrigation_core::Result<Option<SystemStateSnapshot>> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Ok(None);
        };
        for entry in entries.flatten() {
            let Ok(body) = std::fs::read(entry.path()) else { continue };
            let Ok(snapshot) = serde_json::from_slice::<SystemStateSnapshot>(&body) else { continue };
            if snapshot.transition_id == transition_id {
                return Ok(Some(snapshot));
            }
        }
        Ok(None)
    }
}

/// Fast tier (bounded LRU) in front of `durable`. `preserve` writes through
/// both; `restore` reads the fast tier first and falls back to `durable`,
/// the same two-tier shape as the original's Redis-then-Postgres chain,
/// minus the Redis-specific TTL bookkeeping (handled here by cache eviction).
pub struct StatePreservation {
    cache: Mutex<LruCache<Uuid, Arc<SystemStateSnapshot>>>,
    durable: Arc<dyn SnapshotStore>,
}

impl StatePreservation {
    pub fn new(durable: Arc<dyn SnapshotStore>, cache_capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(cache_capacity.max(1)).unwrap())),
            durable,
        }
    }

    pub async fn preserve(&self, snapshot: SystemStateSnapshot) -> irrigation_core::Result<SystemStateSnapshot> {
        self.durable.put(&snapshot).await?;
        self.cache.lock().put(snapshot.transition_id, Arc::new(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn restore(&self, transition_id: Uuid) -> irrigation_core::Result<StateRestoreResult> {
        let cached = self.cache.lock().get(&transition_id).cloned();
        let snapshot = match cached {
            Some(snapshot) => Some((*snapshot).clone()),
            None => self.durable.get_by_transition(transition_id).await?,
        };
        let Some(snapshot) = snapshot else {
            return Ok(StateRestoreResult {
                success: false,
                transition_id,
                warnings: vec![Warning::new("snapshot_not_found", "no preserved state for this transition")],
            });
        };
        if !snapshot.verify() {
            return Ok(StateRestoreResult {
                success: false,
                transition_id,
                warnings: vec![Warning::new("checksum_mismatch", "preserved snapshot failed checksum verification")],
            });
        }
        self.cache.lock().put(transition_id, Arc::new(snapshot));
        Ok(StateRestoreResult {
            success: true,
            transition_id,
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_snapshot() -> SystemStateSnapshot {
        let mut modes = HashMap::new();
        modes.insert(GateId::from("g1"), ControlMode::Manual);
        let mut openings = HashMap::new();
        openings.insert(GateId::from("g1"), 0.5);
        let mut levels = HashMap::new();
        levels.insert(NodeId::from("n1"), 219.0);
        SystemStateSnapshot::new(TransitionType::AutoToManual, "communication_timeout".into(), modes, openings, levels, "system".into())
    }

    #[tokio::test]
    async fn preserve_then_restore_round_trips_through_cache() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(dir.path().to_path_buf()));
        let preservation = StatePreservation::new(store, 10);
        let snapshot = sample_snapshot();
        let transition_id = snapshot.transition_id;
        preservation.preserve(snapshot).await.unwrap();
        let result = preservation.restore(transition_id).await.unwrap();
        assert!(result.success);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn tampered_snapshot_is_rejected_on_restore() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(dir.path().to_path_buf()));
        let mut snapshot = sample_snapshot();
        let transition_id = snapshot.transition_id;
        snapshot.water_levels_m.insert(NodeId::from("n2"), 500.0);
        store.put(&snapshot).await.unwrap();
        let preservation = StatePreservation::new(store, 10);
        let result = preservation.restore(transition_id).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.warnings[0].code, "checksum_mismatch");
    }

    #[tokio::test]
    async fn restoring_an_unknown_transition_reports_not_found() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(dir.path().to_path_buf()));
        let preservation = StatePreservation::new(store, 10);
        let result = preservation.restore(Uuid::new_v4()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.warnings[0].code, "snapshot_not_found");
    }
}
