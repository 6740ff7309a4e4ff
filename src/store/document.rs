//! Document store trait and commit primitives
//!
//! The store exposes versioned reads and an all-or-nothing conditional
//! commit over multiple documents. Serialization of concurrent writers is
//! delegated entirely to the commit's version preconditions; callers own
//! the retry loop.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Collection holding one `RatingAggregate` document per item
pub const RATINGS_COLLECTION: &str = "ratings";

/// Collection holding one `UserRating` document per (user, item) pair
pub const USER_RATINGS_COLLECTION: &str = "user_ratings";

/// A document read together with the store version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    /// Monotonic per-document revision, bumped on every applied write
    pub version: u64,
    /// The document payload
    pub data: Value,
}

/// Condition a write requires to still hold at commit time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePrecondition {
    /// The document must not exist (guards lazy creation)
    Absent,
    /// The document must still be at this revision (guards updates)
    Revision(u64),
}

impl WritePrecondition {
    /// The precondition matching a previously performed read
    pub fn from_read(read: &Option<VersionedDocument>) -> Self {
        match read {
            Some(doc) => WritePrecondition::Revision(doc.version),
            None => WritePrecondition::Absent,
        }
    }
}

/// A single conditional write inside a commit
#[derive(Debug, Clone)]
pub struct WriteOp {
    pub collection: String,
    pub key: String,
    pub precondition: WritePrecondition,
    pub document: Value,
}

impl WriteOp {
    pub fn new(
        collection: &str,
        key: &str,
        precondition: WritePrecondition,
        document: Value,
    ) -> Self {
        Self {
            collection: collection.to_string(),
            key: key.to_string(),
            precondition,
            document,
        }
    }
}

/// Result of attempting a conditional commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// All preconditions held; every write was applied
    Committed,
    /// At least one precondition failed; nothing was applied.
    /// The caller re-reads and retries.
    Conflict,
}

/// Trait for versioned document storage with conditional commits
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document and its current revision. `None` if absent.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<VersionedDocument>>;

    /// Atomically apply all writes, or none if any precondition fails.
    ///
    /// A failed precondition is not an error: it reports `Conflict` so the
    /// caller can re-run its read-modify-write cycle against fresh reads.
    async fn commit(&self, ops: Vec<WriteOp>) -> Result<CommitOutcome>;

    /// Cheap connectivity probe for health checks
    async fn ping(&self) -> Result<()>;
}
