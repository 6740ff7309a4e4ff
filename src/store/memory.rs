//! In-memory document store implementations
//!
//! `InMemoryDocumentStore` is the default backend and the substrate for
//! tests; `MockDocumentStore` layers call recording, forced conflicts and
//! read failures on top of it for exercising the aggregator's retry and
//! degradation paths.

use crate::error::{RatingError, Result};
use crate::store::document::{
    CommitOutcome, DocumentStore, VersionedDocument, WriteOp, WritePrecondition,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredDocument {
    version: u64,
    data: Value,
}

/// In-memory versioned document store
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<(String, String), StoredDocument>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents across all collections (for tests/diagnostics)
    pub fn document_count(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    fn check_precondition(
        existing: Option<&StoredDocument>,
        precondition: WritePrecondition,
    ) -> bool {
        match (existing, precondition) {
            (None, WritePrecondition::Absent) => true,
            (Some(doc), WritePrecondition::Revision(v)) => doc.version == v,
            _ => false,
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<VersionedDocument>> {
        let documents = self
            .documents
            .read()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire documents read lock".to_string(),
            })?;

        Ok(documents
            .get(&(collection.to_string(), key.to_string()))
            .map(|doc| VersionedDocument {
                version: doc.version,
                data: doc.data.clone(),
            }))
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<CommitOutcome> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire documents write lock".to_string(),
            })?;

        // All preconditions are checked before any write is applied, so a
        // conflicting commit leaves the store untouched.
        for op in &ops {
            let existing = documents.get(&(op.collection.clone(), op.key.clone()));
            if !Self::check_precondition(existing, op.precondition) {
                return Ok(CommitOutcome::Conflict);
            }
        }

        for op in ops {
            let entry = documents.entry((op.collection, op.key));
            match entry {
                std::collections::hash_map::Entry::Occupied(mut occupied) => {
                    let doc = occupied.get_mut();
                    doc.version += 1;
                    doc.data = op.document;
                }
                std::collections::hash_map::Entry::Vacant(vacant) => {
                    vacant.insert(StoredDocument {
                        version: 1,
                        data: op.document,
                    });
                }
            }
        }

        Ok(CommitOutcome::Committed)
    }

    async fn ping(&self) -> Result<()> {
        // Only verifies the lock is not poisoned
        self.documents
            .read()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire documents read lock".to_string(),
            })?;
        Ok(())
    }
}

/// Mock document store for testing the aggregator's failure handling
///
/// Wraps an `InMemoryDocumentStore` and adds: commit-call recording, a
/// budget of forced conflicts (each consumed attempt reports `Conflict`
/// without applying anything), and a switch that makes reads fail.
#[derive(Debug, Default)]
pub struct MockDocumentStore {
    inner: InMemoryDocumentStore,
    forced_conflicts: AtomicU64,
    fail_reads: AtomicBool,
    commit_attempts: AtomicUsize,
    committed_writes: AtomicUsize,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commit attempts report a conflict
    pub fn force_conflicts(&self, count: u64) {
        self.forced_conflicts.store(count, Ordering::SeqCst);
    }

    /// Toggle read failures on or off
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Total commit attempts seen, including forced conflicts
    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    /// Total individual writes actually applied
    pub fn committed_writes(&self) -> usize {
        self.committed_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<VersionedDocument>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RatingError::StoreUnavailable {
                message: "simulated read failure".to_string(),
            }
            .into());
        }
        self.inner.get(collection, key).await
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<CommitOutcome> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);

        let consumed_forced_conflict = self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok();
        if consumed_forced_conflict {
            return Ok(CommitOutcome::Conflict);
        }

        let op_count = ops.len();
        let outcome = self.inner.commit(ops).await?;
        if outcome == CommitOutcome::Committed {
            self.committed_writes.fetch_add(op_count, Ordering::SeqCst);
        }
        Ok(outcome)
    }

    async fn ping(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RatingError::StoreUnavailable {
                message: "simulated read failure".to_string(),
            }
            .into());
        }
        self.inner.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document::{RATINGS_COLLECTION, USER_RATINGS_COLLECTION};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_missing_document() {
        let store = InMemoryDocumentStore::new();
        let doc = store.get(RATINGS_COLLECTION, "item1").await.unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let store = InMemoryDocumentStore::new();

        let outcome = store
            .commit(vec![WriteOp::new(
                RATINGS_COLLECTION,
                "item1",
                WritePrecondition::Absent,
                json!({"total_score": 4, "total_ratings": 1}),
            )])
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);

        let doc = store
            .get(RATINGS_COLLECTION, "item1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.data["total_score"], 4);
    }

    #[tokio::test]
    async fn test_version_bumps_on_update() {
        let store = InMemoryDocumentStore::new();

        store
            .commit(vec![WriteOp::new(
                RATINGS_COLLECTION,
                "item1",
                WritePrecondition::Absent,
                json!({"total_score": 4}),
            )])
            .await
            .unwrap();

        let outcome = store
            .commit(vec![WriteOp::new(
                RATINGS_COLLECTION,
                "item1",
                WritePrecondition::Revision(1),
                json!({"total_score": 6}),
            )])
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);

        let doc = store
            .get(RATINGS_COLLECTION, "item1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.data["total_score"], 6);
    }

    #[tokio::test]
    async fn test_stale_revision_conflicts() {
        let store = InMemoryDocumentStore::new();

        store
            .commit(vec![WriteOp::new(
                RATINGS_COLLECTION,
                "item1",
                WritePrecondition::Absent,
                json!({"total_score": 4}),
            )])
            .await
            .unwrap();

        // A writer that read version 1 loses to one that already advanced it
        store
            .commit(vec![WriteOp::new(
                RATINGS_COLLECTION,
                "item1",
                WritePrecondition::Revision(1),
                json!({"total_score": 6}),
            )])
            .await
            .unwrap();

        let outcome = store
            .commit(vec![WriteOp::new(
                RATINGS_COLLECTION,
                "item1",
                WritePrecondition::Revision(1),
                json!({"total_score": 9}),
            )])
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);

        // The losing write must not have been applied
        let doc = store
            .get(RATINGS_COLLECTION, "item1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.data["total_score"], 6);
    }

    #[tokio::test]
    async fn test_create_conflicts_when_document_appeared() {
        let store = InMemoryDocumentStore::new();

        store
            .commit(vec![WriteOp::new(
                RATINGS_COLLECTION,
                "item1",
                WritePrecondition::Absent,
                json!({"total_score": 4}),
            )])
            .await
            .unwrap();

        let outcome = store
            .commit(vec![WriteOp::new(
                RATINGS_COLLECTION,
                "item1",
                WritePrecondition::Absent,
                json!({"total_score": 3}),
            )])
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);
    }

    #[tokio::test]
    async fn test_multi_document_commit_is_all_or_nothing() {
        let store = InMemoryDocumentStore::new();

        store
            .commit(vec![WriteOp::new(
                RATINGS_COLLECTION,
                "item1",
                WritePrecondition::Absent,
                json!({"total_score": 4}),
            )])
            .await
            .unwrap();

        // First op would succeed, second has a stale precondition
        let outcome = store
            .commit(vec![
                WriteOp::new(
                    USER_RATINGS_COLLECTION,
                    "u1_item1",
                    WritePrecondition::Absent,
                    json!({"rating": 4}),
                ),
                WriteOp::new(
                    RATINGS_COLLECTION,
                    "item1",
                    WritePrecondition::Revision(9),
                    json!({"total_score": 8}),
                ),
            ])
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);

        // Neither write landed
        assert!(store
            .get(USER_RATINGS_COLLECTION, "u1_item1")
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.document_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_store_forced_conflicts() {
        let store = MockDocumentStore::new();
        store.force_conflicts(2);

        let op = || {
            vec![WriteOp::new(
                RATINGS_COLLECTION,
                "item1",
                WritePrecondition::Absent,
                json!({"total_score": 4}),
            )]
        };

        assert_eq!(store.commit(op()).await.unwrap(), CommitOutcome::Conflict);
        assert_eq!(store.commit(op()).await.unwrap(), CommitOutcome::Conflict);
        assert_eq!(store.commit(op()).await.unwrap(), CommitOutcome::Committed);
        assert_eq!(store.commit_attempts(), 3);
        assert_eq!(store.committed_writes(), 1);
    }

    #[tokio::test]
    async fn test_mock_store_read_failures() {
        let store = MockDocumentStore::new();
        store.set_fail_reads(true);
        assert!(store.get(RATINGS_COLLECTION, "item1").await.is_err());
        assert!(store.ping().await.is_err());

        store.set_fail_reads(false);
        assert!(store.get(RATINGS_COLLECTION, "item1").await.unwrap().is_none());
    }
}
