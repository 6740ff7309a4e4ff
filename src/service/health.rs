//! Health check probes for the rating service
//!
//! Provides liveness and readiness checks plus a full per-component health
//! report with service statistics.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Submissions committed since service start
    pub ratings_submitted: u64,
    /// Submissions rejected before reaching the store
    pub ratings_rejected: u64,
    /// First ratings vs re-ratings
    pub first_ratings: u64,
    pub rating_updates: u64,
    /// Commit attempts lost to concurrent writers
    pub commit_conflicts: u64,
    /// Store reads served from the local mirror instead
    pub store_read_errors: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(&app_state).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        let store_check = Self::check_document_store(&app_state).await;
        if store_check.status == HealthStatus::Unhealthy {
            // The aggregator degrades reads through its mirror, so a dead
            // store leaves the service degraded rather than down
            if overall_status == HealthStatus::Healthy {
                overall_status = HealthStatus::Degraded;
            }
        }
        checks.push(store_check);

        let aggregator_check = Self::check_aggregator(&app_state).await;
        if aggregator_check.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(aggregator_check);

        let stats = Self::gather_service_stats(&app_state);

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify the service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify the service can handle requests
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        match Self::check_document_store(&app_state).await.status {
            HealthStatus::Healthy => Ok(HealthStatus::Healthy),
            // Reads still work from the mirror; writes will fail
            _ => Ok(HealthStatus::Degraded),
        }
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn check_document_store(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.store().ping().await {
            Ok(()) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Document store ping failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Store ping failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "document_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn check_aggregator(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.aggregator().stats() {
            Ok(_stats) => (HealthStatus::Healthy, None),
            Err(e) => (
                HealthStatus::Unhealthy,
                Some(format!("Stats check failed: {}", e)),
            ),
        };

        ComponentCheck {
            name: "rating_aggregator".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        match app_state.aggregator().stats() {
            Ok(stats) => ServiceStats {
                ratings_submitted: stats.submissions_accepted,
                ratings_rejected: stats.submissions_rejected,
                first_ratings: stats.first_ratings,
                rating_updates: stats.rating_updates,
                commit_conflicts: stats.commit_conflicts,
                store_read_errors: stats.store_read_errors,
            },
            Err(e) => {
                debug!("Failed to get aggregator stats for health check: {}", e);
                ServiceStats {
                    ratings_submitted: 0,
                    ratings_rejected: 0,
                    first_ratings: 0,
                    rating_updates: 0,
                    commit_conflicts: 0,
                    store_read_errors: 0,
                }
            }
        }
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
