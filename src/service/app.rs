//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the document
//! store, identity provider, aggregator, metrics, and HTTP servers
//! together, and manages their lifecycle.

use crate::api::{ApiServer, ApiServerConfig, ApiState};
use crate::auth::{IdentityProvider, StaticIdentityProvider};
use crate::config::AppConfig;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::rating::RatingAggregator;
use crate::store::{DocumentStore, InMemoryDocumentStore};
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Versioned document store backend
    store: Arc<dyn DocumentStore>,

    /// The rating aggregator
    aggregator: Arc<RatingAggregator>,

    /// Metrics collector shared with the aggregator
    metrics_collector: Arc<MetricsCollector>,

    /// Metrics service, present once monitoring is started
    metrics_service: RwLock<Option<Arc<MetricsService>>>,

    /// API server for rating operations
    api_server: Arc<ApiServer>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing tasting-room rating service");
        info!(
            "Configuration: service={}, store={}, rating range {}..={}",
            config.service.name,
            config.store.backend,
            config.rating.min_rating,
            config.rating.max_rating
        );

        let store = Self::initialize_store(&config)?;
        let identity = Self::initialize_identity(&config);

        let metrics_collector = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let aggregator = Arc::new(RatingAggregator::with_metrics(
            store.clone(),
            config.aggregator_config(),
            metrics_collector.clone(),
        ));

        let api_server = Arc::new(ApiServer::new(
            ApiServerConfig {
                port: config.service.http_port,
                host: "0.0.0.0".to_string(),
            },
            ApiState {
                aggregator: aggregator.clone(),
                identity,
            },
        ));

        Ok(Self {
            config,
            store,
            aggregator,
            metrics_collector,
            metrics_service: RwLock::new(None),
            api_server,
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start the rating API server
    pub async fn start(&self) -> Result<()> {
        info!("Starting service components...");

        {
            let mut running = self.is_running.write().await;
            *running = true;
        }

        let api_server = self.api_server.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = api_server.start().await {
                error!("API server terminated: {}", e);
            }
        });

        self.background_tasks.lock().await.push(handle);
        Ok(())
    }

    /// Start the health/metrics server, wired back to this state
    pub async fn start_monitoring(self: &Arc<Self>) -> Result<Arc<MetricsService>> {
        let health_server = Arc::new(
            HealthServer::new(
                HealthServerConfig {
                    port: self.config.service.health_port,
                    host: "0.0.0.0".to_string(),
                },
                self.metrics_collector.clone(),
            )
            .with_app_state(self.clone()),
        );

        let metrics_service = Arc::new(MetricsService::new(
            self.metrics_collector.clone(),
            health_server,
        ));

        let service = metrics_service.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = service.start().await {
                error!("Health server terminated: {}", e);
            }
        });

        self.background_tasks.lock().await.push(handle);
        *self.metrics_service.write().await = Some(metrics_service.clone());

        Ok(metrics_service)
    }

    /// Stop all service components
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping service components...");

        {
            let mut running = self.is_running.write().await;
            *running = false;
        }

        self.api_server.stop().await?;
        if let Some(metrics_service) = self.metrics_service.read().await.as_ref() {
            metrics_service.stop().await?;
        }

        for handle in self.background_tasks.lock().await.drain(..) {
            let _ = handle.await;
        }

        info!("Service components stopped");
        Ok(())
    }

    /// Whether the service is accepting requests
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the document store
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    /// Get the rating aggregator
    pub fn aggregator(&self) -> Arc<RatingAggregator> {
        self.aggregator.clone()
    }

    /// Get the metrics collector
    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    fn initialize_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>, ServiceError> {
        match config.store.backend.as_str() {
            "memory" => Ok(Arc::new(InMemoryDocumentStore::new())),
            other => Err(ServiceError::Configuration {
                message: format!("Unknown store backend '{}'", other),
            }),
        }
    }

    fn initialize_identity(config: &AppConfig) -> Arc<dyn IdentityProvider> {
        if config.service.static_user_id.is_empty() {
            Arc::new(StaticIdentityProvider::anonymous())
        } else {
            info!(
                "Using static identity '{}' for requests without credentials",
                config.service.static_user_id
            );
            Arc::new(StaticIdentityProvider::signed_in(
                &config.service.static_user_id,
            ))
        }
    }
}
