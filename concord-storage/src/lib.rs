//! Concord Storage - Snapshot Persistence
//!
//! Defines the persistence abstraction for hub state. A coordination session
//! is saved as one [`HubSnapshot`] and reloaded verbatim on restart.
//! [`JsonFileStore`] writes one JSON document per session;
//! [`InMemorySnapshotStore`] backs tests and non-durable hubs.

pub mod file;

pub use file::JsonFileStore;

use ::async_trait::async_trait;
use chrono::Utc;
use concord_core::{
    Agent, ConcordError, ConcordResult, Finding, Fix, Issue, Recommendation, StorageError,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Full hub state for one coordination session.
///
/// Every collection keeps append order. Missing top-level fields decode as
/// empty collections and unknown ones are ignored, so older and newer
/// snapshots both load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HubSnapshot {
    pub session_id: String,
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub fixes: Vec<Fix>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default = "Utc::now")]
    pub saved_at: Timestamp,
}

impl HubSnapshot {
    /// Empty snapshot for `session_id`.
    pub fn empty(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            saved_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Total number of persisted records.
    pub fn record_count(&self) -> usize {
        self.agents.len()
            + self.findings.len()
            + self.issues.len()
            + self.fixes.len()
            + self.recommendations.len()
    }

    pub fn to_json(&self) -> ConcordResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            ConcordError::Storage(StorageError::WriteFailed {
                session: self.session_id.clone(),
                reason: e.to_string(),
            })
        })
    }

    pub fn from_json(session_id: &str, json: &str) -> ConcordResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            ConcordError::Storage(StorageError::Corrupt {
                session: session_id.to_string(),
                reason: e.to_string(),
            })
        })
    }
}

// ============================================================================
// SNAPSHOT STORE TRAIT
// ============================================================================

/// Async persistence backend for hub snapshots.
///
/// The hub awaits `save` while holding its write guard, so flushes land in
/// mutation order. Implementations must not block the runtime thread.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot for `snapshot.session_id`.
    async fn save(&self, snapshot: &HubSnapshot) -> ConcordResult<()>;

    /// Load the snapshot for `session_id`, or `None` if nothing was saved.
    async fn load(&self, session_id: &str) -> ConcordResult<Option<HubSnapshot>>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory snapshot store for testing.
/// Thread-safe via RwLock. Writes can be made to fail on demand.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<String, HubSnapshot>>,
    fail_writes: AtomicBool,
    saves: AtomicUsize,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Clear all stored snapshots.
    pub fn clear(&self) {
        if let Ok(mut snapshots) = self.snapshots.write() {
            snapshots.clear();
        }
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: &HubSnapshot) -> ConcordResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ConcordError::Storage(StorageError::WriteFailed {
                session: snapshot.session_id.clone(),
                reason: "write failure injected".to_string(),
            }));
        }
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| ConcordError::Storage(StorageError::LockPoisoned))?;
        snapshots.insert(snapshot.session_id.clone(), snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> ConcordResult<Option<HubSnapshot>> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| ConcordError::Storage(StorageError::LockPoisoned))?;
        Ok(snapshots.get(session_id).cloned())
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::{AgentId, NewFinding, NewIssue};

    fn sample_snapshot(session: &str) -> HubSnapshot {
        let agent_id = AgentId::new("SecurityBot");
        let mut snapshot = HubSnapshot::empty(session);
        snapshot.agents.push(Agent::new(
            agent_id.clone(),
            "SecurityBot",
            "security",
            vec!["security-analysis".to_string()],
        ));
        snapshot.findings.push(Finding::from_new(
            agent_id.clone(),
            NewFinding::new("hardcoded token").with_type("secret"),
        ));
        snapshot
            .issues
            .push(Issue::from_new(agent_id, NewIssue::new("SQL injection")));
        snapshot
    }

    #[tokio::test]
    async fn test_in_memory_save_then_load() {
        let store = InMemorySnapshotStore::new();
        let snapshot = sample_snapshot("s-1");

        store.save(&snapshot).await.unwrap();
        let loaded = store.load("s-1").await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_load_unknown_session() {
        let store = InMemorySnapshotStore::new();
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_save_replaces() {
        let store = InMemorySnapshotStore::new();
        let mut snapshot = sample_snapshot("s-1");
        store.save(&snapshot).await.unwrap();
        snapshot.findings.clear();
        store.save(&snapshot).await.unwrap();
        assert!(store.load("s-1").await.unwrap().unwrap().findings.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_failure_injection() {
        let store = InMemorySnapshotStore::new();
        store.set_fail_writes(true);
        let result = store.save(&sample_snapshot("s-1")).await;
        assert!(matches!(
            result,
            Err(ConcordError::Storage(StorageError::WriteFailed { .. }))
        ));
        assert!(store.load("s-1").await.unwrap().is_none());

        store.set_fail_writes(false);
        store.save(&sample_snapshot("s-1")).await.unwrap();
        assert!(store.load("s-1").await.unwrap().is_some());
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let snapshot = HubSnapshot::from_json("s-2", r#"{"session_id":"s-2"}"#).unwrap();
        assert_eq!(snapshot.session_id, "s-2");
        assert_eq!(snapshot.record_count(), 0);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{"session_id":"s-3","agents":[],"future_field":{"x":1}}"#;
        let snapshot = HubSnapshot::from_json("s-3", json).unwrap();
        assert!(snapshot.agents.is_empty());
    }

    #[test]
    fn test_corrupt_json_is_reported() {
        let result = HubSnapshot::from_json("s-4", "{not json");
        assert!(matches!(
            result,
            Err(ConcordError::Storage(StorageError::Corrupt { .. }))
        ));
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let mut snapshot = sample_snapshot("s-5");
        let agent_id = AgentId::new("PerfBot");
        for title in ["first", "second", "third"] {
            snapshot
                .issues
                .push(Issue::from_new(agent_id.clone(), NewIssue::new(title)));
        }
        let json = snapshot.to_json().unwrap();
        let restored = HubSnapshot::from_json("s-5", &json).unwrap();
        let titles: Vec<_> = restored.issues.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["SQL injection", "first", "second", "third"]);
        assert_eq!(restored, snapshot);
    }
}
