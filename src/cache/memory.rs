//! In-process expiring map.

use std::{
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use super::backend::{CacheBackend, CacheError, CacheStats};

struct Entry {
    value: Value,
    expires_at: Instant,
    size: usize,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local backend. Expired entries are dropped lazily on read and in
/// bulk by [`MemoryBackend::purge_expired`].
pub struct MemoryBackend {
    entries: DashMap<String, Entry>,
    max_keys: usize,
    /// Held across the capacity check and the insert of a bounded store.
    admission: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryBackend {
    /// `max_keys == 0` disables the key limit.
    pub fn new(max_keys: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_keys,
            admission: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    fn ensure_room(&self, key: &str) -> Result<(), CacheError> {
        if self.max_keys == 0 || self.entries.contains_key(key) {
            return Ok(());
        }
        if self.entries.len() < self.max_keys {
            return Ok(());
        }

        let purged = self.purge_expired();
        debug!(target = "hnproxy::cache", purged, "memory cache at capacity");
        if self.entries.len() < self.max_keys {
            Ok(())
        } else {
            Err(CacheError::Capacity {
                max_keys: self.max_keys,
            })
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = Instant::now();
        let live = self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone());
        if let Some(value) = live {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(value));
        }

        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let size = serde_json::to_vec(value)
            .map_err(CacheError::serialization)?
            .len();
        let entry = Entry {
            value: value.clone(),
            expires_at: Instant::now() + ttl,
            size,
        };

        if self.max_keys == 0 {
            self.entries.insert(key.to_string(), entry);
            return Ok(());
        }

        let _admission = self
            .admission
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.ensure_room(key)?;
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let (ksize, vsize) = self
            .entries
            .iter()
            .fold((0usize, 0usize), |(ksize, vsize), entry| {
                (ksize + entry.key().len(), vsize + entry.value().size)
            });

        let mut stats = CacheStats::new();
        stats.insert("hits".into(), self.hits.load(Ordering::Relaxed).into());
        stats.insert("misses".into(), self.misses.load(Ordering::Relaxed).into());
        stats.insert("keys".into(), self.entries.len().into());
        stats.insert("ksize".into(), ksize.into());
        stats.insert("vsize".into(), vsize.into());
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn counts_hits_and_misses() {
        let backend = MemoryBackend::new(0);
        backend
            .set("news", &json!([1, 2]), TTL)
            .await
            .expect("set succeeds");

        assert_eq!(
            backend.get("news").await.expect("get"),
            Some(json!([1, 2]))
        );
        assert_eq!(backend.get("newest").await.expect("get"), None);

        let stats = backend.stats().await.expect("stats");
        assert_eq!(stats["hits"], json!(1));
        assert_eq!(stats["misses"], json!(1));
        assert_eq!(stats["keys"], json!(1));
        assert_eq!(stats["ksize"], json!(4));
        assert_eq!(stats["vsize"], json!(5));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_entries() {
        let backend = MemoryBackend::new(0);
        backend
            .set("short", &json!(1), Duration::from_secs(1))
            .await
            .expect("set short");
        backend
            .set("long", &json!(2), Duration::from_secs(10))
            .await
            .expect("set long");

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(backend.purge_expired(), 1);
        assert_eq!(backend.key_count(), 1);
        assert_eq!(backend.get("long").await.expect("get"), Some(json!(2)));
    }

    #[tokio::test]
    async fn rejects_new_keys_when_full() {
        let backend = MemoryBackend::new(1);
        backend.set("a", &json!(1), TTL).await.expect("first key");

        let err = backend
            .set("b", &json!(2), TTL)
            .await
            .expect_err("second key is rejected");
        assert!(matches!(err, CacheError::Capacity { max_keys: 1 }));

        backend
            .set("a", &json!(3), TTL)
            .await
            .expect("overwrite is allowed");
        assert_eq!(backend.get("a").await.expect("get"), Some(json!(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_makes_room_from_expired_entries() {
        let backend = MemoryBackend::new(1);
        backend
            .set("a", &json!(1), Duration::from_secs(1))
            .await
            .expect("first key");
        tokio::time::advance(Duration::from_secs(2)).await;

        backend
            .set("b", &json!(2), TTL)
            .await
            .expect("expired key frees a slot");
        assert_eq!(backend.key_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_never_exceed_the_key_limit() {
        let backend = std::sync::Arc::new(MemoryBackend::new(4));

        let writers: Vec<_> = (0..64)
            .map(|n| {
                let backend = std::sync::Arc::clone(&backend);
                tokio::spawn(async move {
                    backend.set(&format!("post{n}"), &json!(n), TTL).await.is_ok()
                })
            })
            .collect();

        let mut accepted = 0;
        for writer in writers {
            if writer.await.expect("writer task") {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 4);
        assert_eq!(backend.key_count(), 4);
    }
}
