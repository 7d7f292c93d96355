//! Storage contract shared by the cache backends.

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Flat, backend-native counters.
pub type CacheStats = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache value could not be serialized: {0}")]
    Serialization(String),
    #[error("cache is full ({max_keys} keys)")]
    Capacity { max_keys: usize },
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    pub fn serialization(err: impl std::fmt::Display) -> Self {
        Self::Serialization(err.to_string())
    }

    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// A key/value store with per-entry expiry.
///
/// `get` yields `Ok(None)` for absent and expired keys alike; an expired entry
/// is never returned.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend name reported by the service banner.
    fn kind(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store `value` under `key`, expiring `ttl` from now. Expiry is applied
    /// together with the write.
    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError>;

    /// Best-effort removal. Returns without waiting on the store.
    fn delete(&self, key: &str);

    async fn stats(&self) -> Result<CacheStats, CacheError>;
}
