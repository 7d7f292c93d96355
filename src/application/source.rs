//! Origin adapter traits describing how raw items reach the application.

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;

use crate::domain::entities::{Item, User};
use crate::domain::types::Category;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("origin transport error: {0}")]
    Transport(String),
    #[error("origin returned status {status} for `{path}`")]
    Status { status: u16, path: String },
    #[error("origin payload could not be decoded: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Fetch-by-id access to the origin.
///
/// `Ok(None)` means the origin answered with an empty record; it is a normal
/// outcome, not an error.
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch_item(&self, id: u64) -> Result<Option<Item>, SourceError>;

    /// Ordered story ids of a listing.
    async fn fetch_story_ids(&self, category: Category) -> Result<Vec<u64>, SourceError>;

    async fn fetch_user(&self, id: &str) -> Result<Option<User>, SourceError>;

    /// Fetch several items at once; the result is aligned with `ids`.
    async fn fetch_children(
        &self,
        ids: &[u64],
    ) -> Vec<Result<Option<Item>, SourceError>> {
        join_all(ids.iter().map(|id| self.fetch_item(*id))).await
    }
}
