//! Error types for the rating service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific rating scenarios
#[derive(Debug, thiserror::Error)]
pub enum RatingError {
    #[error("must be signed in to submit a rating")]
    Unauthenticated,

    #[error("rating {rating} is outside the allowed range {min}..={max}")]
    InvalidRating { rating: i64, min: u8, max: u8 },

    #[error("document store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("corrupt document in {collection}/{key}: {reason}")]
    CorruptDocument {
        collection: String,
        key: String,
        reason: String,
    },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("internal service error: {message}")]
    InternalError { message: String },
}

impl RatingError {
    /// Classify an error value produced anywhere in the crate.
    ///
    /// Callers that need to branch on the failure kind (e.g. the HTTP layer
    /// mapping errors to status codes) downcast through this helper instead
    /// of sprinkling `downcast_ref` calls around.
    pub fn from_anyhow(error: &anyhow::Error) -> Option<&RatingError> {
        error.downcast_ref::<RatingError>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_human_readable() {
        let err = RatingError::InvalidRating {
            rating: 6,
            min: 1,
            max: 5,
        };
        assert_eq!(
            err.to_string(),
            "rating 6 is outside the allowed range 1..=5"
        );

        let err = RatingError::Unauthenticated;
        assert_eq!(err.to_string(), "must be signed in to submit a rating");
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = RatingError::StoreUnavailable {
            message: "commit budget exhausted".to_string(),
        }
        .into();

        match RatingError::from_anyhow(&err) {
            Some(RatingError::StoreUnavailable { message }) => {
                assert!(message.contains("budget"));
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }
}
