//! Common types used throughout the rating service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for users
pub type UserId = String;

/// Unique identifier for ratable items (recipes, meal plans)
pub type ItemId = String;

/// Kind of content an item refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Recipe,
    MealPlan,
}

impl Default for ItemType {
    fn default() -> Self {
        ItemType::Recipe
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemType::Recipe => write!(f, "recipe"),
            ItemType::MealPlan => write!(f, "meal_plan"),
        }
    }
}

/// Per-item aggregate: running sum and count of all current ratings.
///
/// Kept exactly consistent with the `UserRating` rows for the item by the
/// aggregator's conditional commit: `total_score` is the sum of every user's
/// current rating, `total_ratings` the number of distinct raters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingAggregate {
    pub item_id: ItemId,
    pub item_type: ItemType,
    pub total_score: i64,
    pub total_ratings: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RatingAggregate {
    /// Create the aggregate for an item's very first rating
    pub fn first(
        item_id: &str,
        item_type: ItemType,
        rating: u8,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            item_id: item_id.to_string(),
            item_type,
            total_score: i64::from(rating),
            total_ratings: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a submission on top of the existing aggregate.
    ///
    /// `old_rating == 0` means the user had no prior rating for this item,
    /// so the rater count grows; otherwise only the score shifts by the
    /// difference between the new and old rating.
    pub fn apply(&mut self, old_rating: u8, new_rating: u8, now: DateTime<Utc>) {
        self.total_score += i64::from(new_rating) - i64::from(old_rating);
        if old_rating == 0 {
            self.total_ratings += 1;
        }
        self.updated_at = now;
    }

    /// The published read model derived from this aggregate
    pub fn stats(&self) -> RatingStats {
        RatingStats {
            average_rating: if self.total_ratings > 0 {
                self.total_score as f64 / self.total_ratings as f64
            } else {
                0.0
            },
            total_ratings: self.total_ratings,
        }
    }
}

/// One user's current rating of one item. Keyed by `{user_id}_{item_id}`;
/// overwritten in place on re-rating, never deleted in normal flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub item_type: ItemType,
    pub rating: u8,
    pub updated_at: DateTime<Utc>,
}

impl UserRating {
    pub fn new(
        user_id: &str,
        item_id: &str,
        item_type: ItemType,
        rating: u8,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            item_type,
            rating,
            updated_at: now,
        }
    }
}

/// Published rating statistics for an item
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RatingStats {
    pub average_rating: f64,
    pub total_ratings: u64,
}

impl RatingStats {
    /// The stats value served when an item has never been rated
    pub fn zero() -> Self {
        Self::default()
    }
}
