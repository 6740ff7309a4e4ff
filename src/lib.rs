//! Tasting Room - rating aggregation service for recipe content
//!
//! This crate keeps per-item rating aggregates consistent with per-user
//! rating rows through optimistic transactions against a versioned document
//! store, and exposes the rating operations over HTTP.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RatingError, Result};
pub use types::*;

// Re-export key components
pub use rating::aggregator::RatingAggregator;
pub use store::{DocumentStore, InMemoryDocumentStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
