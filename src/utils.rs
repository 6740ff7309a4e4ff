//! Utility functions for the rating service

use chrono::{DateTime, Utc};

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Composite key under which a user's rating of an item is stored
pub fn user_rating_key(user_id: &str, item_id: &str) -> String {
    format!("{}_{}", user_id, item_id)
}

/// Cache key for an item's locally mirrored rating statistics
pub fn stats_cache_key(item_id: &str) -> String {
    format!("rating_stats_{}", item_id)
}

/// Cache key for a user's locally mirrored rating of an item
pub fn user_rating_cache_key(user_id: &str, item_id: &str) -> String {
    format!("user_rating_{}_{}", user_id, item_id)
}
