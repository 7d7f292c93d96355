use std::{net::SocketAddr, time::Duration};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{
        HeaderMap, HeaderValue, Request, StatusCode,
        header::{CACHE_CONTROL, REFERER, USER_AGENT},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::error::{ErrorReport, HttpError};

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Which optional request headers end up in the access log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogOptions {
    pub referer: bool,
    pub user_agent: bool,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Stamp every response with the shared-cache policy derived from the TTL.
pub async fn cache_control(
    State(header): State<HeaderValue>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(CACHE_CONTROL, header);
    response
}

pub fn cache_control_value(ttl: Duration) -> HeaderValue {
    let max_age = ttl.as_secs();
    let shared = (max_age + 1) / 2;
    HeaderValue::from_str(&format!("public, max-age={max_age}, s-maxage={shared}"))
        .unwrap_or_else(|_| HeaderValue::from_static("public"))
}

/// Answer 504 when the handler does not produce a response in time.
pub async fn enforce_timeout(
    State(limit): State<Duration>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => HttpError::new(
            "infra::http::middleware::enforce_timeout",
            StatusCode::GATEWAY_TIMEOUT,
            "Server timeout",
            format!("`{path}` exceeded {}ms", limit.as_millis()),
        )
        .into_response(),
    }
}

pub async fn log_responses(
    State(options): State<LogOptions>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let ip = client_ip(&request);
    let referer = options
        .referer
        .then(|| header_str(request.headers(), REFERER.as_str()))
        .flatten();
    let user_agent = options
        .user_agent
        .then(|| header_str(request.headers(), USER_AGENT.as_str()))
        .flatten();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if !status.is_client_error() && !status.is_server_error() {
        info!(
            target = "hnproxy::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            ip = %ip,
            elapsed_ms,
            referer = referer.as_deref().unwrap_or(""),
            user_agent = user_agent.as_deref().unwrap_or(""),
            request_id = request_id,
            "request served",
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, messages) = match report {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if status.is_server_error() {
        error!(
            target = "hnproxy::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            ip = %ip,
            elapsed_ms,
            source = source,
            detail = %detail,
            chain = ?messages,
            request_id = request_id,
            "request failed",
        );
    } else {
        warn!(
            target = "hnproxy::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            ip = %ip,
            elapsed_ms,
            source = source,
            detail = %detail,
            request_id = request_id,
            "client request error",
        );
    }

    response
}

/// Proxy-aware client address: the `X-Forwarded-For` chain when present,
/// otherwise the peer address.
fn client_ip(request: &Request<Body>) -> String {
    if let Some(forwarded) = header_str(request.headers(), FORWARDED_FOR) {
        let chain: Vec<&str> = forwarded
            .split(',')
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .collect();
        if !chain.is_empty() {
            return chain.join(",");
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
