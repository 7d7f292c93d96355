//! Caching JSON proxy for the Hacker News API.
//!
//! [`application::fetcher::TreeFetcher`] resolves items and their comment
//! trees from an [`application::source::ItemSource`];
//! [`cache::ResultCache`] keeps rendered responses in memory or Redis.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
