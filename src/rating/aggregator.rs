//! The rating aggregator
//!
//! Applies a user's rating submission for an item as one atomic adjustment
//! to the item's aggregate, keyed off the user's previous rating, so that
//! repeated ratings update rather than double-count. Concurrent submissions
//! for the same item are serialized by the store's conditional commit; the
//! aggregator re-runs its read-modify-write cycle on conflict, up to a
//! bounded attempt budget.

use crate::cache::LocalCache;
use crate::error::{RatingError, Result};
use crate::metrics::MetricsCollector;
use crate::store::{
    CommitOutcome, DocumentStore, VersionedDocument, WriteOp, WritePrecondition,
    RATINGS_COLLECTION, USER_RATINGS_COLLECTION,
};
use crate::types::{ItemType, RatingAggregate, RatingStats, UserRating};
use crate::utils::{
    current_timestamp, stats_cache_key, user_rating_cache_key, user_rating_key,
};
use chrono::Duration;
use std::sync::{Arc, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the aggregator
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Lowest accepted rating value
    pub min_rating: u8,
    /// Highest accepted rating value
    pub max_rating: u8,
    /// Commit attempts before a submission fails with `StoreUnavailable`
    pub max_commit_attempts: u32,
    /// How long locally mirrored rating data stays servable
    pub cache_ttl: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            min_rating: 1,
            max_rating: 5,
            max_commit_attempts: 5,
            cache_ttl: Duration::hours(24),
        }
    }
}

/// Statistics about aggregator operations
#[derive(Debug, Clone, Default)]
pub struct RatingAggregatorStats {
    /// Submissions that committed
    pub submissions_accepted: u64,
    /// Submissions rejected before touching the store
    pub submissions_rejected: u64,
    /// Accepted submissions that were a user's first rating of the item
    pub first_ratings: u64,
    /// Accepted submissions that replaced a prior rating
    pub rating_updates: u64,
    /// Commit attempts that lost to a concurrent writer
    pub commit_conflicts: u64,
    /// Store reads that failed and fell back to the local cache
    pub store_read_errors: u64,
}

/// The rating aggregator
pub struct RatingAggregator {
    /// Versioned document store holding aggregates and user ratings
    store: Arc<dyn DocumentStore>,
    /// Advisory local mirror of aggregates and user ratings
    cache: LocalCache,
    /// Aggregator configuration
    config: AggregatorConfig,
    /// Metrics collector for recording submission outcomes
    metrics: Arc<MetricsCollector>,
    /// Operation statistics
    stats: Arc<RwLock<RatingAggregatorStats>>,
}

impl RatingAggregator {
    /// Create a new aggregator with a default metrics collector
    pub fn new(store: Arc<dyn DocumentStore>, config: AggregatorConfig) -> Self {
        let metrics = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(store, config, metrics)
    }

    /// Create a new aggregator with a shared metrics collector
    pub fn with_metrics(
        store: Arc<dyn DocumentStore>,
        config: AggregatorConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let cache = LocalCache::new(config.cache_ttl);
        Self {
            store,
            cache,
            config,
            metrics,
            stats: Arc::new(RwLock::new(RatingAggregatorStats::default())),
        }
    }

    /// Submit a user's rating of an item.
    ///
    /// Runs the whole read-modify-write as one optimistic transaction: both
    /// documents are read with their revisions, the new values computed, and
    /// a conditional commit attempted; a conflicting concurrent writer sends
    /// the cycle back to the read phase. After a successful commit the local
    /// mirrors are refreshed.
    pub async fn submit_rating(
        &self,
        user_id: Option<&str>,
        item_id: &str,
        new_rating: i64,
        item_type: ItemType,
    ) -> Result<()> {
        let start_time = Instant::now();

        let user_id = match user_id {
            Some(id) if !id.is_empty() => id,
            _ => {
                self.record_rejection(item_type, "unauthenticated");
                return Err(RatingError::Unauthenticated.into());
            }
        };

        if new_rating < i64::from(self.config.min_rating)
            || new_rating > i64::from(self.config.max_rating)
        {
            self.record_rejection(item_type, "invalid_rating");
            return Err(RatingError::InvalidRating {
                rating: new_rating,
                min: self.config.min_rating,
                max: self.config.max_rating,
            }
            .into());
        }
        let new_rating = new_rating as u8;

        debug!(
            "Submitting rating - user: '{}', item: '{}', rating: {}",
            user_id, item_id, new_rating
        );

        let old_rating = self
            .run_submit_transaction(user_id, item_id, new_rating, item_type)
            .await?;

        // Refresh the local mirrors: the user rating is written through, the
        // aggregate re-read so the published stats reflect the commit.
        self.cache
            .put(&user_rating_cache_key(user_id, item_id), &new_rating);
        self.load_rating_stats(item_id).await;

        {
            let mut stats = self.stats_mut()?;
            stats.submissions_accepted += 1;
            if old_rating == 0 {
                stats.first_ratings += 1;
            } else {
                stats.rating_updates += 1;
            }
        }
        self.metrics
            .record_submission(item_type, "accepted", start_time.elapsed());
        if old_rating == 0 {
            self.metrics.record_first_rating();
        } else {
            self.metrics.record_rating_update();
        }

        info!(
            "Rating committed - user: '{}', item: '{}', rating: {} (was {})",
            user_id, item_id, new_rating, old_rating
        );
        Ok(())
    }

    /// The optimistic read-modify-write loop. Returns the user's previous
    /// rating (0 when this was their first rating of the item).
    async fn run_submit_transaction(
        &self,
        user_id: &str,
        item_id: &str,
        new_rating: u8,
        item_type: ItemType,
    ) -> Result<u8> {
        let user_key = user_rating_key(user_id, item_id);
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            // Read phase: both documents with their revisions
            let user_doc = self.read_for_commit(USER_RATINGS_COLLECTION, &user_key).await?;
            let aggregate_doc = self.read_for_commit(RATINGS_COLLECTION, item_id).await?;

            let old_rating = match &user_doc {
                Some(doc) => self.decode_user_rating(&user_key, doc)?.rating,
                None => 0,
            };

            let now = current_timestamp();
            let updated_user = UserRating::new(user_id, item_id, item_type, new_rating, now);
            let updated_aggregate = match &aggregate_doc {
                Some(doc) => {
                    let mut aggregate = self.decode_aggregate(item_id, doc)?;
                    aggregate.apply(old_rating, new_rating, now);
                    aggregate
                }
                None => RatingAggregate::first(item_id, item_type, new_rating, now),
            };

            let ops = vec![
                WriteOp::new(
                    USER_RATINGS_COLLECTION,
                    &user_key,
                    WritePrecondition::from_read(&user_doc),
                    serde_json::to_value(&updated_user).map_err(|e| {
                        RatingError::InternalError {
                            message: format!("Failed to encode user rating: {}", e),
                        }
                    })?,
                ),
                WriteOp::new(
                    RATINGS_COLLECTION,
                    item_id,
                    WritePrecondition::from_read(&aggregate_doc),
                    serde_json::to_value(&updated_aggregate).map_err(|e| {
                        RatingError::InternalError {
                            message: format!("Failed to encode aggregate: {}", e),
                        }
                    })?,
                ),
            ];

            let outcome = self.store.commit(ops).await.map_err(|e| {
                RatingError::StoreUnavailable {
                    message: format!("commit failed for item '{}': {}", item_id, e),
                }
            })?;

            match outcome {
                CommitOutcome::Committed => return Ok(old_rating),
                CommitOutcome::Conflict => {
                    self.metrics.record_commit_conflict();
                    if let Ok(mut stats) = self.stats.write() {
                        stats.commit_conflicts += 1;
                    }

                    if attempts >= self.config.max_commit_attempts {
                        self.metrics.record_submission(
                            item_type,
                            "store_unavailable",
                            std::time::Duration::default(),
                        );
                        return Err(RatingError::StoreUnavailable {
                            message: format!(
                                "commit for item '{}' conflicted {} times",
                                item_id, attempts
                            ),
                        }
                        .into());
                    }

                    debug!(
                        "Commit conflict for item '{}' (attempt {}/{}), retrying",
                        item_id, attempts, self.config.max_commit_attempts
                    );
                }
            }
        }
    }

    /// Published stats for an item, from the local mirror. Never fails;
    /// an item nobody has rated (or loaded) yields the zero value.
    pub fn get_rating_stats(&self, item_id: &str) -> RatingStats {
        match self.cache.get::<RatingStats>(&stats_cache_key(item_id)) {
            Some(stats) => {
                self.metrics.record_cache_hit("rating_stats");
                stats
            }
            None => {
                self.metrics.record_cache_miss("rating_stats");
                RatingStats::zero()
            }
        }
    }

    /// The caller's own rating of an item, from the local mirror.
    /// 0 for anonymous callers and unrated items. Never fails.
    pub fn get_user_rating(&self, user_id: Option<&str>, item_id: &str) -> u8 {
        let user_id = match user_id {
            Some(id) if !id.is_empty() => id,
            _ => return 0,
        };

        match self
            .cache
            .get::<u8>(&user_rating_cache_key(user_id, item_id))
        {
            Some(rating) => {
                self.metrics.record_cache_hit("user_rating");
                rating
            }
            None => {
                self.metrics.record_cache_miss("user_rating");
                0
            }
        }
    }

    /// Refresh an item's stats mirror from the store and return the stats.
    ///
    /// Two-tier read path: a fresh read always rewrites the mirror; only
    /// when the store read fails is the (possibly stale) mirror served, and
    /// absent that, the zero value. Never fails outward.
    pub async fn load_rating_stats(&self, item_id: &str) -> RatingStats {
        let cache_key = stats_cache_key(item_id);

        match self.store.get(RATINGS_COLLECTION, item_id).await {
            Ok(Some(doc)) => match self.decode_aggregate(item_id, &doc) {
                Ok(aggregate) => {
                    let stats = aggregate.stats();
                    self.cache.put(&cache_key, &stats);
                    stats
                }
                Err(e) => {
                    warn!("Undecodable aggregate for item '{}': {}", item_id, e);
                    self.fallback_stats(&cache_key)
                }
            },
            Ok(None) => {
                let stats = RatingStats::zero();
                self.cache.put(&cache_key, &stats);
                stats
            }
            Err(e) => {
                warn!("Failed to load rating stats for item '{}': {}", item_id, e);
                self.metrics.record_store_error("load_rating_stats");
                if let Ok(mut stats) = self.stats.write() {
                    stats.store_read_errors += 1;
                }
                self.fallback_stats(&cache_key)
            }
        }
    }

    /// Refresh the caller's rating mirror from the store and return it.
    /// Same degradation rules as `load_rating_stats`. Never fails outward.
    pub async fn load_user_rating(&self, user_id: Option<&str>, item_id: &str) -> u8 {
        let user_id = match user_id {
            Some(id) if !id.is_empty() => id,
            _ => return 0,
        };

        let user_key = user_rating_key(user_id, item_id);
        let cache_key = user_rating_cache_key(user_id, item_id);

        match self.store.get(USER_RATINGS_COLLECTION, &user_key).await {
            Ok(Some(doc)) => match self.decode_user_rating(&user_key, &doc) {
                Ok(rating) => {
                    self.cache.put(&cache_key, &rating.rating);
                    rating.rating
                }
                Err(e) => {
                    warn!("Undecodable user rating '{}': {}", user_key, e);
                    self.cache.get::<u8>(&cache_key).unwrap_or(0)
                }
            },
            Ok(None) => {
                self.cache.put(&cache_key, &0u8);
                0
            }
            Err(e) => {
                warn!("Failed to load user rating '{}': {}", user_key, e);
                self.metrics.record_store_error("load_user_rating");
                if let Ok(mut stats) = self.stats.write() {
                    stats.store_read_errors += 1;
                }
                self.cache.get::<u8>(&cache_key).unwrap_or(0)
            }
        }
    }

    /// Populate both mirrors for an item with one call.
    ///
    /// The two reads are independent and issued concurrently; both complete
    /// before this returns.
    pub async fn load_item_data(&self, user_id: Option<&str>, item_id: &str) {
        tokio::join!(
            self.load_rating_stats(item_id),
            self.load_user_rating(user_id, item_id),
        );
    }

    /// Snapshot of operation statistics
    pub fn stats(&self) -> Result<RatingAggregatorStats> {
        Ok(self
            .stats
            .read()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?
            .clone())
    }

    async fn read_for_commit(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<VersionedDocument>> {
        self.store.get(collection, key).await.map_err(|e| {
            RatingError::StoreUnavailable {
                message: format!("reading {}/{}: {}", collection, key, e),
            }
            .into()
        })
    }

    fn decode_user_rating(&self, key: &str, doc: &VersionedDocument) -> Result<UserRating> {
        let rating: UserRating =
            serde_json::from_value(doc.data.clone()).map_err(|e| RatingError::CorruptDocument {
                collection: USER_RATINGS_COLLECTION.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        // 0 is the "no prior rating" sentinel and must never be persisted;
        // an out-of-range stored value is corruption, not an absent rating.
        if rating.rating < self.config.min_rating || rating.rating > self.config.max_rating {
            return Err(RatingError::CorruptDocument {
                collection: USER_RATINGS_COLLECTION.to_string(),
                key: key.to_string(),
                reason: format!(
                    "stored rating {} outside {}..={}",
                    rating.rating, self.config.min_rating, self.config.max_rating
                ),
            }
            .into());
        }

        Ok(rating)
    }

    fn decode_aggregate(&self, item_id: &str, doc: &VersionedDocument) -> Result<RatingAggregate> {
        let aggregate: RatingAggregate =
            serde_json::from_value(doc.data.clone()).map_err(|e| RatingError::CorruptDocument {
                collection: RATINGS_COLLECTION.to_string(),
                key: item_id.to_string(),
                reason: e.to_string(),
            })?;

        if aggregate.total_ratings == 0 && aggregate.total_score != 0 {
            return Err(RatingError::CorruptDocument {
                collection: RATINGS_COLLECTION.to_string(),
                key: item_id.to_string(),
                reason: format!(
                    "aggregate has score {} with zero ratings",
                    aggregate.total_score
                ),
            }
            .into());
        }

        Ok(aggregate)
    }

    fn fallback_stats(&self, cache_key: &str) -> RatingStats {
        match self.cache.get::<RatingStats>(cache_key) {
            Some(stats) => {
                self.metrics.record_cache_hit("rating_stats");
                stats
            }
            None => {
                self.metrics.record_cache_miss("rating_stats");
                RatingStats::zero()
            }
        }
    }

    fn record_rejection(&self, item_type: ItemType, reason: &str) {
        if let Ok(mut stats) = self.stats.write() {
            stats.submissions_rejected += 1;
        }
        self.metrics
            .record_submission(item_type, reason, std::time::Duration::default());
    }

    fn stats_mut(&self) -> Result<std::sync::RwLockWriteGuard<'_, RatingAggregatorStats>> {
        self.stats.write().map_err(|_| {
            RatingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            }
            .into()
        })
    }
}
