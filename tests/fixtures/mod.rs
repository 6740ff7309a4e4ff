//! Test fixtures and store doubles for integration testing

use async_trait::async_trait;
use std::sync::Arc;
use tasting_room::error::Result;
use tasting_room::rating::{AggregatorConfig, RatingAggregator};
use tasting_room::store::{
    CommitOutcome, DocumentStore, InMemoryDocumentStore, MockDocumentStore, VersionedDocument,
    WriteOp,
};

/// Document store that adds latency to every operation, widening the race
/// window between concurrent submitters
pub struct LatencyDocumentStore {
    inner: Arc<dyn DocumentStore>,
    delay_ms: u64,
}

impl LatencyDocumentStore {
    pub fn new(inner: Arc<dyn DocumentStore>, delay_ms: u64) -> Self {
        Self { inner, delay_ms }
    }

    async fn simulate_latency(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
    }
}

#[async_trait]
impl DocumentStore for LatencyDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<VersionedDocument>> {
        self.simulate_latency().await;
        self.inner.get(collection, key).await
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<CommitOutcome> {
        self.simulate_latency().await;
        self.inner.commit(ops).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

/// A complete test system: one aggregator over an instrumented store
pub fn create_test_system() -> (Arc<RatingAggregator>, Arc<MockDocumentStore>) {
    let store = Arc::new(MockDocumentStore::new());
    let aggregator = Arc::new(RatingAggregator::new(
        store.clone(),
        AggregatorConfig::default(),
    ));
    (aggregator, store)
}

/// An aggregator over an existing store, simulating another client instance
/// of the same backing database
pub fn create_client(store: Arc<dyn DocumentStore>) -> Arc<RatingAggregator> {
    Arc::new(RatingAggregator::new(store, AggregatorConfig::default()))
}

/// A shared in-memory store for multi-client tests
pub fn create_shared_store() -> Arc<InMemoryDocumentStore> {
    Arc::new(InMemoryDocumentStore::new())
}
