//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "hnproxy";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 29;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_TTL_SECS: u64 = 600;
const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 600;
const DEFAULT_ORIGIN_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";
const DEFAULT_COMMENT_TIMEOUT_MS: u64 = 1000;
const DEFAULT_LIST_LIMIT: u64 = 30;
const DEFAULT_MAX_PAGE: u64 = 10;
const DEFAULT_LIST_CONCURRENCY: u64 = 10;
const DEFAULT_ORIGIN_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Command-line arguments for the hnproxy binary.
#[derive(Debug, Parser)]
#[command(
    name = "hnproxy",
    version,
    about = "Caching JSON proxy for Hacker News"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "HNPROXY_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP proxy.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the per-request timeout.
    #[arg(long = "server-request-timeout-seconds", value_name = "SECONDS")]
    pub server_request_timeout_seconds: Option<u64>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Include the Referer header in request logs.
    #[arg(
        long = "log-referer",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_referer: Option<bool>,

    /// Include the User-Agent header in request logs.
    #[arg(
        long = "log-user-agent",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_user_agent: Option<bool>,

    /// Override the default cache TTL.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Use a Redis cache at this URL instead of the in-process cache.
    #[arg(long = "cache-redis-url", value_name = "URL")]
    pub cache_redis_url: Option<String>,

    /// Override the in-process cache key limit (0 = unbounded).
    #[arg(long = "cache-max-keys", value_name = "COUNT")]
    pub cache_max_keys: Option<u64>,

    /// Override the origin API base URL.
    #[arg(long = "origin-base-url", value_name = "URL")]
    pub origin_base_url: Option<String>,

    /// Override the per-comment fetch deadline.
    #[arg(long = "origin-comment-timeout-ms", value_name = "MILLIS")]
    pub origin_comment_timeout_ms: Option<u64>,

    /// Override the number of concurrent item requests per listing page.
    #[arg(long = "origin-list-concurrency", value_name = "COUNT")]
    pub origin_list_concurrency: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub origin: OriginSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub request_timeout: Duration,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
    pub referer: bool,
    pub user_agent: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl_seconds: NonZeroU64,
    pub redis_url: Option<String>,
    pub max_keys: usize,
    pub sweep_interval_seconds: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct OriginSettings {
    pub base_url: String,
    pub comment_timeout: Duration,
    pub list_limit: NonZeroU32,
    pub max_page: NonZeroU32,
    pub list_concurrency: NonZeroU32,
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("HNPROXY").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    origin: RawOriginSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_request_timeout_seconds {
            self.server.request_timeout_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(referer) = overrides.log_referer {
            self.logging.referer = Some(referer);
        }
        if let Some(user_agent) = overrides.log_user_agent {
            self.logging.user_agent = Some(user_agent);
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(url) = overrides.cache_redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(max_keys) = overrides.cache_max_keys {
            self.cache.max_keys = Some(max_keys);
        }
        if let Some(url) = overrides.origin_base_url.as_ref() {
            self.origin.base_url = Some(url.clone());
        }
        if let Some(timeout) = overrides.origin_comment_timeout_ms {
            self.origin.comment_timeout_ms = Some(timeout);
        }
        if let Some(concurrency) = overrides.origin_list_concurrency {
            self.origin.list_concurrency = Some(concurrency);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            origin,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            origin: build_origin_settings(origin)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let request_timeout = non_zero_secs(
        server
            .request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        "server.request_timeout_seconds",
    )?;
    let graceful_shutdown = non_zero_secs(
        server
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
        "server.graceful_shutdown_seconds",
    )?;

    Ok(ServerSettings {
        addr,
        request_timeout,
        graceful_shutdown,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings {
        level,
        format,
        referer: logging.referer.unwrap_or(false),
        user_agent: logging.user_agent.unwrap_or(false),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_seconds = NonZeroU64::new(cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS))
        .ok_or_else(|| LoadError::invalid("cache.ttl_seconds", "must be greater than zero"))?;
    let sweep_interval_seconds = NonZeroU64::new(
        cache
            .sweep_interval_seconds
            .unwrap_or(DEFAULT_CACHE_SWEEP_INTERVAL_SECS),
    )
    .ok_or_else(|| {
        LoadError::invalid("cache.sweep_interval_seconds", "must be greater than zero")
    })?;

    let redis_url = cache.redis_url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_keys = usize::try_from(cache.max_keys.unwrap_or(0)).map_err(|_| {
        LoadError::invalid("cache.max_keys", "value exceeds supported range for usize")
    })?;

    Ok(CacheSettings {
        ttl_seconds,
        redis_url,
        max_keys,
        sweep_interval_seconds,
    })
}

fn build_origin_settings(origin: RawOriginSettings) -> Result<OriginSettings, LoadError> {
    let base_url = origin
        .base_url
        .unwrap_or_else(|| DEFAULT_ORIGIN_BASE_URL.to_string());
    let parsed = Url::parse(base_url.trim())
        .map_err(|err| LoadError::invalid("origin.base_url", format!("failed to parse: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "origin.base_url",
            "scheme must be http or https",
        ));
    }

    let comment_timeout_ms = origin
        .comment_timeout_ms
        .unwrap_or(DEFAULT_COMMENT_TIMEOUT_MS);
    if comment_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "origin.comment_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(OriginSettings {
        base_url: base_url.trim().trim_end_matches('/').to_string(),
        comment_timeout: Duration::from_millis(comment_timeout_ms),
        list_limit: non_zero_u32(
            origin.list_limit.unwrap_or(DEFAULT_LIST_LIMIT),
            "origin.list_limit",
        )?,
        max_page: non_zero_u32(
            origin.max_page.unwrap_or(DEFAULT_MAX_PAGE),
            "origin.max_page",
        )?,
        list_concurrency: non_zero_u32(
            origin.list_concurrency.unwrap_or(DEFAULT_LIST_CONCURRENCY),
            "origin.list_concurrency",
        )?,
        request_timeout: non_zero_secs(
            origin
                .request_timeout_seconds
                .unwrap_or(DEFAULT_ORIGIN_REQUEST_TIMEOUT_SECS),
            "origin.request_timeout_seconds",
        )?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    request_timeout_seconds: Option<u64>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
    referer: Option<bool>,
    user_agent: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    ttl_seconds: Option<u64>,
    redis_url: Option<String>,
    max_keys: Option<u64>,
    sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOriginSettings {
    base_url: Option<String>,
    comment_timeout_ms: Option<u64>,
    list_limit: Option<u64>,
    max_page: Option<u64>,
    list_concurrency: Option<u64>,
    request_timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }

    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;

    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}
