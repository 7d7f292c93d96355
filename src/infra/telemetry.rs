use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

const QUIET_DEPENDENCIES: [&str; 3] = ["hyper_util=warn", "reqwest=warn", "redis=info"];

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let mut env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    // Client internals log every origin round trip at debug.
    for directive in QUIET_DEPENDENCIES {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "hnproxy_cache_hit_total",
            Unit::Count,
            "Total number of result-cache hits."
        );
        describe_counter!(
            "hnproxy_cache_miss_total",
            Unit::Count,
            "Total number of result-cache misses, including backend errors."
        );
        describe_counter!(
            "hnproxy_cache_write_failure_total",
            Unit::Count,
            "Total number of result-cache writes rejected by the backend."
        );
        describe_counter!(
            "hnproxy_origin_request_total",
            Unit::Count,
            "Total number of requests sent to the origin API."
        );
        describe_counter!(
            "hnproxy_origin_error_total",
            Unit::Count,
            "Total number of failed origin API requests."
        );
        describe_histogram!(
            "hnproxy_origin_request_ms",
            Unit::Milliseconds,
            "Origin API request latency in milliseconds."
        );
    });
}
