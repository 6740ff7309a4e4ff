//! User identity integration
//!
//! The rating service never authenticates users itself; it consumes an
//! identity provider that reports who the current caller is, if anyone.

pub mod provider;

// Re-export commonly used types
pub use provider::{IdentityProvider, MockIdentityProvider, StaticIdentityProvider};
