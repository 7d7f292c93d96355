//! Backend-agnostic result cache.

use std::{sync::Arc, time::Duration};

use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::backend::{CacheBackend, CacheError, CacheStats};

const METRIC_CACHE_HIT: &str = "hnproxy_cache_hit_total";
const METRIC_CACHE_MISS: &str = "hnproxy_cache_miss_total";
const METRIC_CACHE_WRITE_FAILURE: &str = "hnproxy_cache_write_failure_total";

/// Shared cache handle used by the request handlers.
///
/// Keys are chosen by the caller; the cache knows nothing about how keys
/// relate to one another.
#[derive(Clone)]
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.backend.kind()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// `Ok(None)` is a miss. Errors mean the caller should compute the value
    /// as if it had missed.
    pub async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let kind = self.kind();
        let result = self.backend.get(key).await;
        match &result {
            Ok(Some(_)) => counter!(METRIC_CACHE_HIT, "backend" => kind).increment(1),
            Ok(None) | Err(_) => counter!(METRIC_CACHE_MISS, "backend" => kind).increment(1),
        }
        result
    }

    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    pub async fn set_with_ttl<T>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        let result = match serde_json::to_value(value) {
            Ok(value) => self.backend.set(key, &value, ttl).await,
            Err(err) => Err(CacheError::serialization(err)),
        };

        if let Err(err) = &result {
            counter!(METRIC_CACHE_WRITE_FAILURE, "backend" => self.kind()).increment(1);
            warn!(target = "hnproxy::cache", key, error = %err, "cache write failed");
        }
        result
    }

    /// Drop `key` without waiting on the backend.
    pub fn delete(&self, key: &str) {
        debug!(target = "hnproxy::cache", key, "cache delete");
        self.backend.delete(key);
    }

    /// Backend counters, or an empty map when the backend cannot report.
    pub async fn stats(&self) -> CacheStats {
        match self.backend.stats().await {
            Ok(stats) => stats,
            Err(err) => {
                debug!(target = "hnproxy::cache", error = %err, "cache stats unavailable");
                CacheStats::new()
            }
        }
    }
}
