//! Cache configuration.
//!
//! Selects the backend and its limits from the `[cache]` section of
//! `hnproxy.toml`.

use std::time::Duration;

use tracing::warn;

const DEFAULT_TTL_SECONDS: u64 = 600;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 600;
const REDIS_SCHEME: &str = "redis://";

/// Which storage the result cache is built on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Redis(String),
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime applied to writes that do not pass their own TTL.
    pub ttl: Duration,
    /// Remote store address. Unset selects the in-process backend.
    pub redis_url: Option<String>,
    /// In-process key limit; zero means unbounded.
    pub max_keys: usize,
    /// How often the in-process backend drops expired entries.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            redis_url: None,
            max_keys: 0,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECONDS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            ttl: Duration::from_secs(settings.ttl_seconds.get()),
            redis_url: settings.redis_url.clone(),
            max_keys: settings.max_keys,
            sweep_interval: Duration::from_secs(settings.sweep_interval_seconds.get()),
        }
    }
}

impl CacheConfig {
    /// Resolve the backend. A URL without the `redis://` scheme is ignored
    /// with a warning and the in-process backend is used instead.
    pub fn backend(&self) -> BackendKind {
        match self.redis_url.as_deref().map(str::trim) {
            None | Some("") => BackendKind::Memory,
            Some(url) if url.starts_with(REDIS_SCHEME) => BackendKind::Redis(url.to_string()),
            Some(url) => {
                warn!(
                    target = "hnproxy::cache",
                    redis_url = url,
                    "redis url must start with redis://; falling back to memory cache"
                );
                BackendKind::Memory
            }
        }
    }

    /// Seconds advertised to downstream caches for a fresh response.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(600));
        assert_eq!(config.max_keys, 0);
        assert_eq!(config.sweep_interval, Duration::from_secs(600));
        assert_eq!(config.backend(), BackendKind::Memory);
    }

    #[test]
    fn redis_url_selects_remote_backend() {
        let config = CacheConfig {
            redis_url: Some("redis://127.0.0.1:6379".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.backend(),
            BackendKind::Redis("redis://127.0.0.1:6379".to_string())
        );
    }

    #[test]
    fn foreign_scheme_falls_back_to_memory() {
        let config = CacheConfig {
            redis_url: Some("http://127.0.0.1:6379".to_string()),
            ..Default::default()
        };
        assert_eq!(config.backend(), BackendKind::Memory);
    }

    #[test]
    fn blank_url_means_memory() {
        let config = CacheConfig {
            redis_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.backend(), BackendKind::Memory);
    }
}
