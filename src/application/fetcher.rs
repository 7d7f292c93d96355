//! Recursive item and comment-tree resolution against an [`ItemSource`].
//!
//! Comments are fetched under a per-node deadline: a slow or missing branch is
//! dropped from the tree instead of failing the whole request. The root item,
//! listing items and poll parts carry no deadline and surface origin errors.

use std::{sync::Arc, time::Duration};

use futures::{
    StreamExt, TryStreamExt,
    future::{BoxFuture, FutureExt, join_all},
    stream,
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use crate::application::render::{self, ListedItem, RenderedItem, RenderedUser};
use crate::application::source::{ItemSource, SourceError};
use crate::domain::entities::Item;
use crate::domain::types::Category;

const DEFAULT_COMMENT_TIMEOUT_MS: u64 = 1000;
const DEFAULT_LIST_LIMIT: usize = 30;
const DEFAULT_LIST_CONCURRENCY: usize = 10;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("origin request failed")]
    Origin(#[from] SourceError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
}

impl FetchError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Deadline for each comment's own origin round trip.
    pub comment_timeout: Duration,
    /// Stories per listing page.
    pub list_limit: usize,
    /// Maximum in-flight item requests while resolving a listing page.
    pub list_concurrency: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            comment_timeout: Duration::from_millis(DEFAULT_COMMENT_TIMEOUT_MS),
            list_limit: DEFAULT_LIST_LIMIT,
            list_concurrency: DEFAULT_LIST_CONCURRENCY,
        }
    }
}

/// An item with its resolved comments and, for polls, its resolved options.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTree {
    pub item: Item,
    pub comments: Vec<ResolvedTree>,
    pub parts: Vec<Item>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchContext {
    Root,
    Comment,
}

#[derive(Clone)]
pub struct TreeFetcher {
    source: Arc<dyn ItemSource>,
    config: FetcherConfig,
}

impl TreeFetcher {
    pub fn new(source: Arc<dyn ItemSource>, config: FetcherConfig) -> Self {
        Self { source, config }
    }

    /// Resolve `id` and its whole comment tree. `Ok(None)` means the origin
    /// has no record for `id`.
    #[instrument(skip(self))]
    pub async fn fetch_tree(&self, id: u64) -> Result<Option<ResolvedTree>, FetchError> {
        self.resolve(id, FetchContext::Root, Vec::new()).await
    }

    /// One page of a story listing, flat, in origin order. Absent items are
    /// skipped.
    #[instrument(skip(self), fields(category = category.as_str()))]
    pub async fn fetch_list(
        &self,
        category: Category,
        page: usize,
    ) -> Result<Vec<Item>, FetchError> {
        let ids = self.source.fetch_story_ids(category).await?;
        let limit = self.config.list_limit;
        let start = page.saturating_sub(1).saturating_mul(limit);
        let window: Vec<u64> = ids.into_iter().skip(start).take(limit).collect();

        let items: Vec<Option<Item>> = stream::iter(window)
            .map(|id| self.source.fetch_item(id))
            .buffered(self.config.list_concurrency.max(1))
            .try_collect()
            .await?;

        Ok(items.into_iter().flatten().collect())
    }

    /// Rendered item detail for the item route.
    pub async fn item(&self, id: u64) -> Result<RenderedItem, FetchError> {
        let tree = self
            .fetch_tree(id)
            .await?
            .ok_or_else(|| FetchError::not_found("item", id))?;
        Ok(render::render_tree(&tree, now()))
    }

    /// Rendered listing page.
    pub async fn stories(
        &self,
        category: Category,
        page: usize,
    ) -> Result<Vec<ListedItem>, FetchError> {
        let items = self.fetch_list(category, page).await?;
        let now = now();
        Ok(items
            .iter()
            .map(|item| render::render_listed(item, now))
            .collect())
    }

    /// Rendered user profile.
    pub async fn user(&self, id: &str) -> Result<RenderedUser, FetchError> {
        let user = self
            .source
            .fetch_user(id)
            .await?
            .ok_or_else(|| FetchError::not_found("user", id))?;
        Ok(render::render_user(&user, now()))
    }

    /// `ancestors` holds the ids on the path from the root down to `id`; a
    /// kid that points back into that path is treated as absent.
    fn resolve(
        &self,
        id: u64,
        context: FetchContext,
        ancestors: Vec<u64>,
    ) -> BoxFuture<'_, Result<Option<ResolvedTree>, FetchError>> {
        async move {
            if ancestors.contains(&id) {
                debug!(id, depth = ancestors.len(), "comment cycle detected, skipping");
                return Ok(None);
            }

            let item = match context {
                FetchContext::Root => self.source.fetch_item(id).await?,
                FetchContext::Comment => self.fetch_comment(id).await,
            };
            let Some(item) = item else {
                return Ok(None);
            };

            let mut path = ancestors;
            path.push(id);
            let kids = join_all(
                item.kids
                    .iter()
                    .map(|kid| self.resolve(*kid, FetchContext::Comment, path.clone())),
            );
            let (kids, parts) = futures::join!(kids, self.fetch_parts(&item));

            // join_all keeps input order, so kid order survives regardless of
            // which fetch settled first.
            let comments = kids
                .into_iter()
                .filter_map(|resolved| match resolved {
                    Ok(node) => node,
                    Err(err) => {
                        warn!(parent = id, error = %err, "dropping comment subtree after error");
                        None
                    }
                })
                .collect();

            Ok(Some(ResolvedTree {
                item,
                comments,
                parts: parts?,
            }))
        }
        .boxed()
    }

    /// Fetch a comment under the configured deadline.
    ///
    /// The origin request runs in its own task; when the deadline passes the
    /// task is left to finish on its own and the comment counts as absent.
    async fn fetch_comment(&self, id: u64) -> Option<Item> {
        let source = Arc::clone(&self.source);
        let request = tokio::spawn(async move { source.fetch_item(id).await });

        match tokio::time::timeout(self.config.comment_timeout, request).await {
            Ok(Ok(Ok(item))) => item,
            Ok(Ok(Err(err))) => {
                warn!(id, error = %err, "comment fetch failed, treating as absent");
                None
            }
            Ok(Err(err)) => {
                warn!(id, error = %err, "comment fetch task aborted");
                None
            }
            Err(_) => {
                debug!(
                    id,
                    timeout_ms = self.config.comment_timeout.as_millis() as u64,
                    "comment fetch timed out"
                );
                None
            }
        }
    }

    async fn fetch_parts(&self, item: &Item) -> Result<Vec<Item>, FetchError> {
        if !item.is_poll() || item.parts.is_empty() {
            return Ok(Vec::new());
        }

        let mut parts = Vec::with_capacity(item.parts.len());
        for fetched in self.source.fetch_children(&item.parts).await {
            if let Some(part) = fetched? {
                parts.push(part);
            }
        }
        Ok(parts)
    }
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
