//! Result cache
//!
//! Stores rendered responses under caller-chosen keys with a per-entry TTL.
//! Two backends implement [`CacheBackend`]:
//!
//! - **memory**: an in-process expiring map, swept periodically
//! - **redis**: a remote store reached through a background connection
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! ttl_seconds = 600
//! # redis_url = "redis://127.0.0.1:6379"
//! max_keys = 0
//! sweep_interval_seconds = 600
//! ```

mod backend;
mod config;
pub mod keys;
mod memory;
mod redis;
mod store;

pub use backend::{CacheBackend, CacheError, CacheStats};
pub use config::{BackendKind, CacheConfig};
pub use memory::MemoryBackend;
pub use self::redis::{ConnectErrorHook, RedisBackend, parse_info};
pub use store::ResultCache;
