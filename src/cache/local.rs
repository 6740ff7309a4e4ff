//! TTL-bounded in-process cache of JSON values

use crate::utils::current_timestamp;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Age and expiry information about a cached entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    pub age: Duration,
    pub expires_in: Duration,
    pub is_expired: bool,
}

/// In-process key-value cache with per-entry expiry
///
/// Expired entries are ignored by reads and reclaimed by `purge_expired`;
/// they are never served.
#[derive(Debug)]
pub struct LocalCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl LocalCache {
    /// Create a cache whose entries expire after `default_ttl`
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Store a value under the default TTL
    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Store a value that expires after `ttl`
    pub fn put_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let serialized = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to serialize cache entry '{}': {}", key, e);
                return;
            }
        };

        let now = current_timestamp();
        let entry = CacheEntry {
            value: serialized,
            cached_at: now,
            expires_at: now + ttl,
        };

        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), entry);
            debug!("Cached entry '{}' (ttl: {}s)", key, ttl.num_seconds());
        }
    }

    /// Read a value, ignoring missing, expired, or undecodable entries
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;

        if current_timestamp() > entry.expires_at {
            debug!("Cache entry '{}' expired", key);
            return None;
        }

        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to decode cache entry '{}': {}", key, e);
                None
            }
        }
    }

    /// Remove one entry
    pub fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Reclaim entries whose TTL has passed; returns how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = current_timestamp();
        match self.entries.write() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|_, entry| entry.expires_at >= now);
                before - entries.len()
            }
            Err(_) => 0,
        }
    }

    /// Age and expiry info for an entry, if present
    pub fn info(&self, key: &str) -> Option<CacheInfo> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        let now = current_timestamp();

        Some(CacheInfo {
            age: now - entry.cached_at,
            expires_in: entry.expires_at - now,
            is_expired: now > entry.expires_at,
        })
    }

    /// Number of entries, including not-yet-purged expired ones
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
