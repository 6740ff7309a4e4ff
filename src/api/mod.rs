//! HTTP API for the rating service
//!
//! The surface exposed to UI callers: read an item's rating stats, read the
//! caller's own rating, and submit a rating. Authentication is terminated
//! upstream; requests carry the caller's identity in the `x-user-id` header.

pub mod handlers;
pub mod server;

// Re-export commonly used types
pub use handlers::{ApiState, SubmitRatingRequest, UserRatingResponse};
pub use server::{ApiServer, ApiServerConfig};
