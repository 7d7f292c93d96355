//! Redis-backed cache.
//!
//! The connection is opened in the background so a missing server never
//! blocks startup; until it is up every call reports
//! [`CacheError::Unavailable`] and the caller falls through to the origin.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::backend::{CacheBackend, CacheError, CacheStats};

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Called with every redis error: failed connection attempts and failed
/// commands alike.
pub type ConnectErrorHook = Arc<dyn Fn(&redis::RedisError) + Send + Sync>;

pub struct RedisBackend {
    connection: Arc<OnceCell<ConnectionManager>>,
    on_error: ConnectErrorHook,
}

impl RedisBackend {
    /// Validate `url` and start connecting in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(url: &str, on_error: ConnectErrorHook) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::backend)?;
        let connection = Arc::new(OnceCell::new());

        let slot = Arc::clone(&connection);
        let hook = Arc::clone(&on_error);
        tokio::spawn(async move {
            let mut delay = INITIAL_RETRY_DELAY;
            loop {
                match ConnectionManager::new(client.clone()).await {
                    Ok(manager) => {
                        if slot.set(manager).is_ok() {
                            info!(target = "hnproxy::cache", "redis connection established");
                        }
                        break;
                    }
                    Err(err) => {
                        hook(&err);
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(MAX_RETRY_DELAY);
                    }
                }
            }
        });

        Ok(Self {
            connection,
            on_error,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connection.initialized()
    }

    fn conn(&self) -> Result<ConnectionManager, CacheError> {
        self.connection
            .get()
            .cloned()
            .ok_or_else(|| CacheError::Unavailable("redis connection not established".into()))
    }

    /// Hand a command failure to the hook and convert it for the caller.
    fn report(&self, err: redis::RedisError) -> CacheError {
        (self.on_error)(&err);
        CacheError::backend(err)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.conn()?;
        let raw = conn
            .get::<_, Option<String>>(key)
            .await
            .map_err(|err| self.report(err))?;

        raw.map(|text| serde_json::from_str(&text).map_err(CacheError::serialization))
            .transpose()
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let text = serde_json::to_string(value).map_err(CacheError::serialization)?;
        let mut conn = self.conn()?;
        // PSETEX stores value and expiry in one command.
        conn.pset_ex::<_, _, ()>(key, text, expiry_millis(ttl))
            .await
            .map_err(|err| self.report(err))
    }

    fn delete(&self, key: &str) {
        let mut conn = match self.conn() {
            Ok(conn) => conn,
            Err(err) => {
                debug!(target = "hnproxy::cache", key, error = %err, "skipping redis delete");
                return;
            }
        };

        let key = key.to_string();
        let hook = Arc::clone(&self.on_error);
        tokio::spawn(async move {
            if let Err(err) = conn.del::<_, i32>(&key).await {
                warn!(target = "hnproxy::cache", key = %key, error = %err, "redis delete failed");
                hook(&err);
            }
        });
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut conn = self.conn()?;
        let info = redis::cmd("INFO")
            .arg("stats")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|err| self.report(err))?;
        Ok(parse_info(&info))
    }
}

/// Millisecond expiry for `PSETEX`; redis rejects zero.
fn expiry_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Flatten an `INFO` reply into `field -> value`. Section headers and blank
/// lines are skipped; integer values are kept numeric.
pub fn parse_info(info: &str) -> CacheStats {
    info.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(field, value)| {
            let parsed = value
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::from(value));
            (field.to_string(), parsed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_info_flattens_sections() {
        let info = "# Server\r\nredis_version:7.2.4\r\nuptime_in_seconds:42\r\n\r\n# Keyspace\r\ndb0:keys=3,expires=3,avg_ttl=0\r\n";
        let stats = parse_info(info);

        assert_eq!(stats.len(), 3);
        assert_eq!(stats["redis_version"], json!("7.2.4"));
        assert_eq!(stats["uptime_in_seconds"], json!(42));
        assert_eq!(stats["db0"], json!("keys=3,expires=3,avg_ttl=0"));
    }

    #[test]
    fn parse_info_ignores_garbage() {
        assert!(parse_info("").is_empty());
        assert!(parse_info("no separator here\n# Header").is_empty());
    }

    #[test]
    fn expiry_keeps_sub_second_precision() {
        assert_eq!(expiry_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(expiry_millis(Duration::from_millis(250)), 250);
        assert_eq!(expiry_millis(Duration::ZERO), 1);
    }

    #[test]
    fn rejects_malformed_urls() {
        let hook: ConnectErrorHook = Arc::new(|_| {});
        let result = RedisBackend::connect("not a url", hook);
        assert!(matches!(result, Err(CacheError::Backend(_))));
    }

    #[tokio::test]
    async fn calls_before_connecting_are_unavailable() {
        // Nothing listens on port 1, so the background connect keeps failing.
        let hook: ConnectErrorHook = Arc::new(|_| {});
        let backend = RedisBackend::connect("redis://127.0.0.1:1", hook).expect("valid url");

        let err = backend.get("news").await.expect_err("not connected");
        assert!(matches!(err, CacheError::Unavailable(_)));
        backend.delete("news");
        assert!(!backend.is_connected());
    }

    #[tokio::test]
    async fn command_failures_reach_the_error_hook() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let backend = RedisBackend {
            connection: Arc::new(OnceCell::new()),
            on_error: Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        };

        // Not connected yet: reported as unavailable without touching the hook.
        let err = backend.get("news").await.expect_err("not connected");
        assert!(matches!(err, CacheError::Unavailable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let failure = redis::RedisError::from((redis::ErrorKind::IoError, "connection reset"));
        let err = backend.report(failure);
        assert!(matches!(err, CacheError::Backend(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
