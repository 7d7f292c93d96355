use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header::CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    application::{error::HttpError, fetcher::TreeFetcher},
    cache::{ResultCache, keys},
    domain::types::Category,
};

use super::middleware::{
    LogOptions, cache_control, cache_control_value, enforce_timeout, log_responses,
    set_request_context,
};

const SOURCE: &str = "infra::http::public";
const SLOW_FETCH: Duration = Duration::from_secs(25);
const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /";

#[derive(Clone)]
pub struct HttpState {
    pub fetcher: Arc<TreeFetcher>,
    pub cache: ResultCache,
    /// Highest listing page served; larger requests are clamped.
    pub max_page: usize,
}

/// Cross-cutting behaviour applied around every route.
#[derive(Clone, Copy, Debug)]
pub struct RouterOptions {
    pub request_timeout: Duration,
    pub log: LogOptions,
}

pub fn build_router(state: HttpState, options: RouterOptions) -> Router {
    let cache_header = cache_control_value(state.cache.default_ttl());

    Router::new()
        .route("/", get(index))
        .route("/favicon.ico", get(favicon))
        .route("/robots.txt", get(robots_txt))
        .route("/item/{id}", get(item))
        .route("/user/{id}", get(user))
        .route("/{listing}", get(listing))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            options.request_timeout,
            enforce_timeout,
        ))
        .layer(middleware::from_fn_with_state(cache_header, cache_control))
        .layer(middleware::from_fn_with_state(options.log, log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn index(State(state): State<HttpState>) -> Json<Value> {
    let repository = env!("CARGO_PKG_REPOSITORY");
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "desc": "Unofficial Hacker News API",
        "version": env!("CARGO_PKG_VERSION"),
        "project_url": (!repository.is_empty()).then_some(repository),
        "cache_type": state.cache.kind(),
        "cache_stats": state.cache.stats().await,
    }))
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn robots_txt() -> Response {
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], ROBOTS_TXT).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

async fn listing(
    State(state): State<HttpState>,
    Path(listing): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, HttpError> {
    let (category, page) = resolve_listing(&listing, query.page.as_deref(), state.max_page)
        .ok_or_else(|| not_found(format!("no listing named `{listing}`")))?;

    let key = keys::list_key(category, page);
    if let Some(hit) = cached(&state.cache, &key).await {
        return Ok(Json(hit).into_response());
    }

    if let Some(stale) = keys::invalidated_by(category, page) {
        state.cache.delete(&stale);
    }

    let stories = state.fetcher.stories(category, page).await?;
    store(&state.cache, &key, &stories).await;
    Ok(Json(stories).into_response())
}

async fn item(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    let id: u64 = id
        .parse()
        .map_err(|_| not_found(format!("`{id}` is not an item id")))?;

    let key = keys::post_key(id);
    if let Some(hit) = cached(&state.cache, &key).await {
        return Ok(Json(hit).into_response());
    }

    let started = Instant::now();
    let rendered = state.fetcher.item(id).await?;
    let elapsed = started.elapsed();
    if elapsed > SLOW_FETCH {
        info!(
            target = "hnproxy::http::item",
            id,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow item fetch"
        );
    }

    store(&state.cache, &key, &rendered).await;
    Ok(Json(rendered).into_response())
}

async fn user(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    if !is_user_id(&id) {
        return Err(not_found(format!("`{id}` is not a user id")));
    }

    let key = keys::user_key(&id);
    if let Some(hit) = cached(&state.cache, &key).await {
        return Ok(Json(hit).into_response());
    }

    let rendered = state.fetcher.user(&id).await?;
    store(&state.cache, &key, &rendered).await;
    Ok(Json(rendered).into_response())
}

async fn fallback() -> HttpError {
    not_found("no route")
}

/// Map a listing path segment and `?page=` to a category and page.
///
/// `news2` always means page two of `news`. Pages are clamped to
/// `1..=max_page`; anything unparsable is page one.
fn resolve_listing(
    listing: &str,
    page: Option<&str>,
    max_page: usize,
) -> Option<(Category, usize)> {
    if listing == "news2" {
        return Some((Category::News, 2));
    }

    let category = Category::parse(listing)?;
    let requested = page
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(1);
    let page = requested.clamp(1, max_page.max(1) as i64) as usize;
    Some((category, page))
}

fn is_user_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// A read error is handled like a miss.
async fn cached(cache: &ResultCache, key: &str) -> Option<Value> {
    match cache.get(key).await {
        Ok(hit) => hit,
        Err(err) => {
            debug!(target = "hnproxy::cache", key, error = %err, "cache read failed");
            None
        }
    }
}

/// Failed writes are counted and logged by the cache; the response is
/// served regardless.
async fn store<T: Serialize>(cache: &ResultCache, key: &str, value: &T) {
    let _ = cache.set(key, value).await;
}

fn not_found(detail: impl Into<String>) -> HttpError {
    HttpError::new(SOURCE, StatusCode::NOT_FOUND, "Not found", detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn news2_ignores_the_page_parameter() {
        assert_eq!(
            resolve_listing("news2", Some("7"), 10),
            Some((Category::News, 2))
        );
    }

    #[test]
    fn pages_are_clamped() {
        assert_eq!(
            resolve_listing("best", Some("0"), 10),
            Some((Category::Best, 1))
        );
        assert_eq!(
            resolve_listing("best", Some("99"), 10),
            Some((Category::Best, 10))
        );
        assert_eq!(
            resolve_listing("ask", Some("abc"), 10),
            Some((Category::Ask, 1))
        );
        assert_eq!(resolve_listing("show", None, 10), Some((Category::Show, 1)));
    }

    #[test]
    fn unknown_listings_do_not_resolve() {
        assert_eq!(resolve_listing("shownew", None, 10), None);
        assert_eq!(resolve_listing("news3", None, 10), None);
    }

    #[test]
    fn user_ids_are_word_characters() {
        assert!(is_user_id("pg"));
        assert!(is_user_id("some_user-1"));
        assert!(!is_user_id(""));
        assert!(!is_user_id("a b"));
        assert!(!is_user_id("../etc"));
    }
}
