//! Document store abstraction with optimistic-concurrency commits
//!
//! This module defines the versioned document store the aggregator runs its
//! read-modify-write transactions against, with in-memory and test-double
//! implementations.

pub mod document;
pub mod memory;

// Re-export commonly used types
pub use document::{
    CommitOutcome, DocumentStore, VersionedDocument, WriteOp, WritePrecondition,
    RATINGS_COLLECTION, USER_RATINGS_COLLECTION,
};
pub use memory::{InMemoryDocumentStore, MockDocumentStore};
