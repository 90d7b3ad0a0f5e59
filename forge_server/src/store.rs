//! In-memory build store — keyed, process-lifetime storage of build records.
//!
//! A single shared handle is constructed at startup and injected into every
//! request handler and orchestrator run. Mutations go through one RwLock
//! critical section; a build's record is only mutated by its own run, so
//! contention stays low. Records are never evicted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::build::{BuildRecord, BuildStatus, ChainProof, GeneratedFile};

/// Partial update applied to an existing record. `None` fields are left
/// untouched, so an empty patch is a no-op.
#[derive(Debug, Clone, Default)]
pub struct BuildPatch {
    pub status: Option<BuildStatus>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration: Option<String>,
    pub program_id: Option<String>,
}

#[derive(Clone, Default)]
pub struct BuildStore {
    inner: Arc<RwLock<HashMap<String, BuildRecord>>>,
}

impl BuildStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created record. Ids are generated uniquely by the
    /// orchestrator, so a duplicate means a caller bug, not a runtime
    /// condition to recover from.
    pub async fn insert(&self, record: BuildRecord) -> anyhow::Result<()> {
        let mut map = self.inner.write().await;
        if map.contains_key(&record.id) {
            anyhow::bail!("duplicate build id: {}", record.id);
        }
        map.insert(record.id.clone(), record);
        Ok(())
    }

    /// Merge the provided fields into an existing record. No-op when the id
    /// is absent.
    pub async fn patch(&self, id: &str, patch: BuildPatch) {
        let mut map = self.inner.write().await;
        let Some(record) = map.get_mut(id) else {
            tracing::debug!(build_id = id, "patch for unknown build ignored");
            return;
        };
        if let Some(status) = patch.status {
            // Status moves to a terminal value exactly once and never reverts.
            if record.status.is_terminal() {
                tracing::warn!(build_id = id, "ignoring status change on terminal build");
            } else {
                record.status = status;
            }
        }
        if let Some(completed_at) = patch.completed_at {
            record.completed_at = Some(completed_at);
        }
        if let Some(duration) = patch.duration {
            record.duration = Some(duration);
        }
        if let Some(program_id) = patch.program_id {
            record.program_id = Some(program_id);
        }
    }

    /// Append a generated artifact. Files accumulate in emission order.
    pub async fn push_file(&self, id: &str, file: GeneratedFile) {
        let mut map = self.inner.write().await;
        if let Some(record) = map.get_mut(id) {
            record.files.push(file);
        }
    }

    /// Append a ledger anchor. Proofs accumulate in phase order.
    pub async fn push_proof(&self, id: &str, proof: ChainProof) {
        let mut map = self.inner.write().await;
        if let Some(record) = map.get_mut(id) {
            record.chain_proofs.push(proof);
        }
    }

    pub async fn get(&self, id: &str) -> Option<BuildRecord> {
        self.inner.read().await.get(id).cloned()
    }

    /// All records, most recently started first.
    pub async fn list_all(&self) -> Vec<BuildRecord> {
        let map = self.inner.read().await;
        let mut records: Vec<BuildRecord> = map.values().cloned().collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, started_at: DateTime<Utc>) -> BuildRecord {
        BuildRecord::new(id.to_string(), "Build a token vault", started_at)
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = BuildStore::new();
        let rec = record("build_a", Utc::now());
        store.insert(rec.clone()).await.unwrap();
        assert_eq!(store.get("build_a").await.unwrap(), rec);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = BuildStore::new();
        let now = Utc::now();
        store.insert(record("build_a", now)).await.unwrap();
        assert!(store.insert(record("build_a", now)).await.is_err());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn empty_patch_leaves_record_unchanged() {
        let store = BuildStore::new();
        let rec = record("build_a", Utc::now());
        store.insert(rec.clone()).await.unwrap();
        store.patch("build_a", BuildPatch::default()).await;
        assert_eq!(store.get("build_a").await.unwrap(), rec);
    }

    #[tokio::test]
    async fn patch_merges_only_provided_fields() {
        let store = BuildStore::new();
        store.insert(record("build_a", Utc::now())).await.unwrap();
        store
            .patch(
                "build_a",
                BuildPatch {
                    status: Some(BuildStatus::Success),
                    duration: Some("2m 5s".to_string()),
                    ..Default::default()
                },
            )
            .await;
        let rec = store.get("build_a").await.unwrap();
        assert_eq!(rec.status, BuildStatus::Success);
        assert_eq!(rec.duration.as_deref(), Some("2m 5s"));
        assert_eq!(rec.completed_at, None);
        assert_eq!(rec.program_id, None);
    }

    #[tokio::test]
    async fn terminal_status_never_reverts() {
        let store = BuildStore::new();
        store.insert(record("build_a", Utc::now())).await.unwrap();
        store
            .patch(
                "build_a",
                BuildPatch {
                    status: Some(BuildStatus::Failed),
                    ..Default::default()
                },
            )
            .await;
        store
            .patch(
                "build_a",
                BuildPatch {
                    status: Some(BuildStatus::InProgress),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(
            store.get("build_a").await.unwrap().status,
            BuildStatus::Failed
        );
    }

    #[tokio::test]
    async fn patch_for_absent_id_is_a_noop() {
        let store = BuildStore::new();
        store.patch("missing", BuildPatch::default()).await;
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn list_all_orders_by_started_at_descending() {
        let store = BuildStore::new();
        let t1 = Utc::now() - Duration::minutes(30);
        let t2 = Utc::now() - Duration::minutes(20);
        let t3 = Utc::now() - Duration::minutes(10);
        store.insert(record("build_t2", t2)).await.unwrap();
        store.insert(record("build_t1", t1)).await.unwrap();
        store.insert(record("build_t3", t3)).await.unwrap();

        let ids: Vec<String> = store.list_all().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["build_t3", "build_t2", "build_t1"]);
    }

    #[tokio::test]
    async fn proofs_and_files_append_in_order() {
        let store = BuildStore::new();
        store.insert(record("build_a", Utc::now())).await.unwrap();
        for step in [0u32, 2, 3] {
            store
                .push_proof(
                    "build_a",
                    ChainProof {
                        step,
                        tx_ref: format!("ref{step}"),
                        hash: "abcdef0123".to_string(),
                    },
                )
                .await;
        }
        store
            .push_file(
                "build_a",
                GeneratedFile {
                    name: "lib.rs".to_string(),
                    content: "// program".to_string(),
                },
            )
            .await;

        let rec = store.get("build_a").await.unwrap();
        let steps: Vec<u32> = rec.chain_proofs.iter().map(|p| p.step).collect();
        assert_eq!(steps, vec![0, 2, 3]);
        assert!(steps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(rec.files.len(), 1);
    }
}
