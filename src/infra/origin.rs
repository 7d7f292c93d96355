//! HTTP client for the Hacker News Firebase API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    application::source::{ItemSource, SourceError},
    config::OriginSettings,
    domain::{
        entities::{Item, User},
        types::Category,
    },
};

use super::error::InfraError;

const METRIC_ORIGIN_REQUEST: &str = "hnproxy_origin_request_total";
const METRIC_ORIGIN_ERROR: &str = "hnproxy_origin_error_total";
const METRIC_ORIGIN_REQUEST_MS: &str = "hnproxy_origin_request_ms";

/// [`ItemSource`] backed by `{base}/item/{id}.json` and friends.
///
/// The API answers `null` for ids it does not know; that decodes to `None`.
#[derive(Clone, Debug)]
pub struct HttpItemSource {
    client: Client,
    base_url: String,
}

impl HttpItemSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::origin(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &OriginSettings) -> Result<Self, InfraError> {
        Self::new(settings.base_url.clone(), settings.request_timeout)
    }

    pub fn user_agent() -> &'static str {
        concat!("hnproxy/", env!("CARGO_PKG_VERSION"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}.json", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let started = Instant::now();
        counter!(METRIC_ORIGIN_REQUEST).increment(1);

        let result = self.send(path).await;
        histogram!(METRIC_ORIGIN_REQUEST_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        if result.is_err() {
            counter!(METRIC_ORIGIN_ERROR).increment(1);
        }
        result
    }

    async fn send<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let url = self.url(path);
        debug!(target = "hnproxy::origin", url = %url, "origin request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(SourceError::transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SourceError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let body = response.bytes().await.map_err(SourceError::transport)?;
        serde_json::from_slice(&body).map_err(SourceError::decode)
    }
}

#[async_trait]
impl ItemSource for HttpItemSource {
    async fn fetch_item(&self, id: u64) -> Result<Option<Item>, SourceError> {
        self.get_json(&format!("item/{id}")).await
    }

    async fn fetch_story_ids(&self, category: Category) -> Result<Vec<u64>, SourceError> {
        let ids: Option<Vec<u64>> = self.get_json(category.endpoint()).await?;
        Ok(ids.unwrap_or_default())
    }

    async fn fetch_user(&self, id: &str) -> Result<Option<User>, SourceError> {
        self.get_json(&format!("user/{id}")).await
    }
}
