//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the rating aggregation
//! service: submission outcomes, commit conflicts, cache effectiveness,
//! store errors, and request durations.

use crate::rating::RatingAggregatorStats;
use crate::types::ItemType;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Main metrics collector for the rating service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Rating submission metrics
    rating_metrics: RatingMetrics,

    /// Local cache metrics
    cache_metrics: CacheMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,

    /// Store operations that failed, by operation
    pub store_errors_total: IntCounterVec,
}

/// Rating submission metrics
#[derive(Clone)]
pub struct RatingMetrics {
    /// Submissions by item type and outcome
    pub submissions_total: IntCounterVec,

    /// Submissions that were a user's first rating of an item
    pub first_ratings_total: IntCounter,

    /// Submissions that replaced a prior rating
    pub rating_updates_total: IntCounter,

    /// Commit attempts lost to concurrent writers
    pub commit_conflicts_total: IntCounter,
}

/// Local cache metrics
#[derive(Clone)]
pub struct CacheMetrics {
    /// Cache hits by mirror
    pub hits_total: IntCounterVec,

    /// Cache misses by mirror
    pub misses_total: IntCounterVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Rating submission processing time
    pub submit_duration_seconds: Histogram,

    /// Load/read processing time by operation
    pub load_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let rating_metrics = RatingMetrics::new(&registry)?;
        let cache_metrics = CacheMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            rating_metrics,
            cache_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get rating metrics
    pub fn rating(&self) -> &RatingMetrics {
        &self.rating_metrics
    }

    /// Get cache metrics
    pub fn cache(&self) -> &CacheMetrics {
        &self.cache_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a submission and its processing time
    pub fn record_submission(&self, item_type: ItemType, outcome: &str, duration: Duration) {
        let item_type_str = match item_type {
            ItemType::Recipe => "recipe",
            ItemType::MealPlan => "meal_plan",
        };

        self.rating_metrics
            .submissions_total
            .with_label_values(&[item_type_str, outcome])
            .inc();

        if outcome == "accepted" {
            self.performance_metrics
                .submit_duration_seconds
                .observe(duration.as_secs_f64());
        }
    }

    /// Record a first rating of an item by a user
    pub fn record_first_rating(&self) {
        self.rating_metrics.first_ratings_total.inc();
    }

    /// Record a re-rating that replaced a prior value
    pub fn record_rating_update(&self) {
        self.rating_metrics.rating_updates_total.inc();
    }

    /// Record a commit attempt lost to a concurrent writer
    pub fn record_commit_conflict(&self) {
        self.rating_metrics.commit_conflicts_total.inc();
    }

    /// Record a cache hit on one of the local mirrors
    pub fn record_cache_hit(&self, mirror: &str) {
        self.cache_metrics.hits_total.with_label_values(&[mirror]).inc();
    }

    /// Record a cache miss on one of the local mirrors
    pub fn record_cache_miss(&self, mirror: &str) {
        self.cache_metrics
            .misses_total
            .with_label_values(&[mirror])
            .inc();
    }

    /// Record a failed store operation
    pub fn record_store_error(&self, operation: &str) {
        self.service_metrics
            .store_errors_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Record the duration of a load operation
    pub fn record_load_duration(&self, operation: &str, duration: Duration) {
        self.performance_metrics
            .load_duration_seconds
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Update overall health status (0=unhealthy, 1=degraded, 2=healthy)
    pub fn update_health_status(&self, status: i64) {
        self.service_metrics.health_status.set(status);
    }

    /// Update a single component's health status
    pub fn update_component_health(&self, component: &str, status: i64) {
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Reconcile counters with an aggregator stats snapshot.
    ///
    /// Used when a collector is attached after the aggregator has already
    /// processed traffic; counters only ever move forward.
    pub fn update_from_aggregator_stats(&self, stats: &RatingAggregatorStats) {
        let recorded = self.rating_metrics.commit_conflicts_total.get();
        if stats.commit_conflicts > recorded {
            self.rating_metrics
                .commit_conflicts_total
                .inc_by(stats.commit_conflicts - recorded);
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        // Registration into a fresh registry cannot collide; if it fails
        // anyway we fall back to an unregistered collector
        Self::new().unwrap_or_else(|e| {
            warn!("Metrics registration failed: {}", e);
            let registry = Arc::new(Registry::new());
            Self {
                registry: registry.clone(),
                service_metrics: ServiceMetrics::unregistered(),
                rating_metrics: RatingMetrics::unregistered(),
                cache_metrics: CacheMetrics::unregistered(),
                performance_metrics: PerformanceMetrics::unregistered(),
            }
        })
    }
}

impl ServiceMetrics {
    fn build() -> Result<Self> {
        Ok(Self {
            health_status: IntGauge::new(
                "tasting_room_health_status",
                "Overall health status (0=unhealthy, 1=degraded, 2=healthy)",
            )?,
            component_health: IntGaugeVec::new(
                Opts::new(
                    "tasting_room_component_health",
                    "Per-component health status",
                ),
                &["component"],
            )?,
            store_errors_total: IntCounterVec::new(
                Opts::new(
                    "tasting_room_store_errors_total",
                    "Document store operations that failed",
                ),
                &["operation"],
            )?,
        })
    }

    fn new(registry: &Registry) -> Result<Self> {
        let metrics = Self::build()?;
        registry.register(Box::new(metrics.health_status.clone()))?;
        registry.register(Box::new(metrics.component_health.clone()))?;
        registry.register(Box::new(metrics.store_errors_total.clone()))?;
        Ok(metrics)
    }

    fn unregistered() -> Self {
        Self::build().expect("static metric definitions are valid")
    }
}

impl RatingMetrics {
    fn build() -> Result<Self> {
        Ok(Self {
            submissions_total: IntCounterVec::new(
                Opts::new(
                    "tasting_room_submissions_total",
                    "Rating submissions by item type and outcome",
                ),
                &["item_type", "outcome"],
            )?,
            first_ratings_total: IntCounter::new(
                "tasting_room_first_ratings_total",
                "Submissions that were a user's first rating of an item",
            )?,
            rating_updates_total: IntCounter::new(
                "tasting_room_rating_updates_total",
                "Submissions that replaced a user's prior rating",
            )?,
            commit_conflicts_total: IntCounter::new(
                "tasting_room_commit_conflicts_total",
                "Commit attempts lost to concurrent writers",
            )?,
        })
    }

    fn new(registry: &Registry) -> Result<Self> {
        let metrics = Self::build()?;
        registry.register(Box::new(metrics.submissions_total.clone()))?;
        registry.register(Box::new(metrics.first_ratings_total.clone()))?;
        registry.register(Box::new(metrics.rating_updates_total.clone()))?;
        registry.register(Box::new(metrics.commit_conflicts_total.clone()))?;
        Ok(metrics)
    }

    fn unregistered() -> Self {
        Self::build().expect("static metric definitions are valid")
    }
}

impl CacheMetrics {
    fn build() -> Result<Self> {
        Ok(Self {
            hits_total: IntCounterVec::new(
                Opts::new("tasting_room_cache_hits_total", "Local mirror cache hits"),
                &["mirror"],
            )?,
            misses_total: IntCounterVec::new(
                Opts::new(
                    "tasting_room_cache_misses_total",
                    "Local mirror cache misses",
                ),
                &["mirror"],
            )?,
        })
    }

    fn new(registry: &Registry) -> Result<Self> {
        let metrics = Self::build()?;
        registry.register(Box::new(metrics.hits_total.clone()))?;
        registry.register(Box::new(metrics.misses_total.clone()))?;
        Ok(metrics)
    }

    fn unregistered() -> Self {
        Self::build().expect("static metric definitions are valid")
    }
}

impl PerformanceMetrics {
    fn build() -> Result<Self> {
        Ok(Self {
            submit_duration_seconds: Histogram::with_opts(
                HistogramOpts::new(
                    "tasting_room_submit_duration_seconds",
                    "Rating submission processing time",
                )
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            )?,
            load_duration_seconds: HistogramVec::new(
                HistogramOpts::new(
                    "tasting_room_load_duration_seconds",
                    "Rating data load time by operation",
                )
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
                &["operation"],
            )?,
        })
    }

    fn new(registry: &Registry) -> Result<Self> {
        let metrics = Self::build()?;
        registry.register(Box::new(metrics.submit_duration_seconds.clone()))?;
        registry.register(Box::new(metrics.load_duration_seconds.clone()))?;
        Ok(metrics)
    }

    fn unregistered() -> Self {
        Self::build().expect("static metric definitions are valid")
    }
}
