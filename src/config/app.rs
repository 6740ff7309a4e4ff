//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! tasting-room rating service, including environment variable loading,
//! TOML file loading, and validation.

use crate::rating::AggregatorConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub store: StoreSettings,
    pub rating: RatingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the rating API
    pub http_port: u16,
    /// Port for health check and metrics endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Ambient user identity for development mode (empty = anonymous)
    pub static_user_id: String,
}

/// Document store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Store backend ("memory" is the only built-in backend)
    pub backend: String,
    /// Commit attempts per submission before giving up
    pub max_commit_attempts: u32,
}

/// Rating-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingSettings {
    /// Lowest accepted rating value
    pub min_rating: u8,
    /// Highest accepted rating value
    pub max_rating: u8,
    /// Hours before locally mirrored rating data expires
    pub cache_ttl_hours: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "tasting-room".to_string(),
            log_level: "info".to_string(),
            http_port: 8080,
            health_port: 8081,
            shutdown_timeout_seconds: 30,
            static_user_id: String::new(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            max_commit_attempts: 5,
        }
    }
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            min_rating: 1,
            max_rating: 5,
            cache_ttl_hours: 24,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            config.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HTTP_PORT value: {}", port))?;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            config.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(user) = env::var("STATIC_USER_ID") {
            config.service.static_user_id = user;
        }

        // Store settings
        if let Ok(backend) = env::var("STORE_BACKEND") {
            config.store.backend = backend;
        }
        if let Ok(attempts) = env::var("STORE_MAX_COMMIT_ATTEMPTS") {
            config.store.max_commit_attempts = attempts
                .parse()
                .map_err(|_| anyhow!("Invalid STORE_MAX_COMMIT_ATTEMPTS value: {}", attempts))?;
        }

        // Rating settings
        if let Ok(min) = env::var("RATING_MIN") {
            config.rating.min_rating = min
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_MIN value: {}", min))?;
        }
        if let Ok(max) = env::var("RATING_MAX") {
            config.rating.max_rating = max
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_MAX value: {}", max))?;
        }
        if let Ok(ttl) = env::var("RATING_CACHE_TTL_HOURS") {
            config.rating.cache_ttl_hours = ttl
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_CACHE_TTL_HOURS value: {}", ttl))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Aggregator configuration derived from the store and rating settings
    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            min_rating: self.rating.min_rating,
            max_rating: self.rating.max_rating,
            max_commit_attempts: self.store.max_commit_attempts,
            cache_ttl: chrono::Duration::hours(self.rating.cache_ttl_hours as i64),
        }
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.http_port == config.service.health_port {
        return Err(anyhow!(
            "HTTP and health ports must differ (both {})",
            config.service.http_port
        ));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate store settings
    if config.store.backend.is_empty() {
        return Err(anyhow!("Store backend cannot be empty"));
    }
    if config.store.max_commit_attempts == 0 {
        return Err(anyhow!("Max commit attempts must be greater than 0"));
    }

    // Validate rating settings
    if config.rating.min_rating == 0 {
        return Err(anyhow!(
            "Minimum rating must be greater than 0 (0 is the no-rating sentinel)"
        ));
    }
    if config.rating.min_rating >= config.rating.max_rating {
        return Err(anyhow!(
            "Minimum rating {} must be below maximum rating {}",
            config.rating.min_rating,
            config.rating.max_rating
        ));
    }
    if config.rating.cache_ttl_hours == 0 {
        return Err(anyhow!("Cache TTL must be greater than 0"));
    }

    Ok(())
}
