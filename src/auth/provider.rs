//! Identity provider trait and implementations

use crate::types::UserId;
use std::sync::RwLock;
use tracing::warn;

/// Trait for resolving the current caller's identity
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user's id, or `None` for anonymous callers
    fn current_user_id(&self) -> Option<UserId>;
}

/// Identity provider with a fixed identity
///
/// Used for development mode and single-user tooling, where the process
/// runs on behalf of one configured user (or anonymously).
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    user_id: Option<UserId>,
}

impl StaticIdentityProvider {
    /// Provider that always reports the given user
    pub fn signed_in(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
        }
    }

    /// Provider that always reports an anonymous caller
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn current_user_id(&self) -> Option<UserId> {
        self.user_id.clone()
    }
}

/// Mock identity provider for testing
///
/// The signed-in user can be changed between calls to simulate different
/// callers or sign-out.
#[derive(Debug, Default)]
pub struct MockIdentityProvider {
    user_id: RwLock<Option<UserId>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign a user in
    pub fn set_user(&self, user_id: &str) {
        if let Ok(mut user) = self.user_id.write() {
            *user = Some(user_id.to_string());
        }
    }

    /// Sign the current user out
    pub fn clear_user(&self) {
        if let Ok(mut user) = self.user_id.write() {
            *user = None;
        }
    }
}

impl IdentityProvider for MockIdentityProvider {
    fn current_user_id(&self) -> Option<UserId> {
        match self.user_id.read() {
            Ok(user) => user.clone(),
            Err(_) => {
                warn!("Identity lock poisoned, treating caller as anonymous");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_provider_signed_in() {
        let provider = StaticIdentityProvider::signed_in("u1");
        assert_eq!(provider.current_user_id(), Some("u1".to_string()));
    }

    #[test]
    fn test_static_provider_anonymous() {
        let provider = StaticIdentityProvider::anonymous();
        assert_eq!(provider.current_user_id(), None);
    }

    #[test]
    fn test_mock_provider_sign_in_and_out() {
        let provider = MockIdentityProvider::new();
        assert_eq!(provider.current_user_id(), None);

        provider.set_user("u1");
        assert_eq!(provider.current_user_id(), Some("u1".to_string()));

        provider.set_user("u2");
        assert_eq!(provider.current_user_id(), Some("u2".to_string()));

        provider.clear_user();
        assert_eq!(provider.current_user_id(), None);
    }
}
