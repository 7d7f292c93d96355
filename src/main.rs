use std::{net::SocketAddr, process, sync::Arc, time::Duration};

use hnproxy::{
    application::{
        error::AppError,
        fetcher::{FetcherConfig, TreeFetcher},
    },
    cache::{
        BackendKind, CacheConfig, ConnectErrorHook, MemoryBackend, RedisBackend, ResultCache,
    },
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState, LogOptions, RouterOptions},
        origin::HttpItemSource,
        telemetry,
    },
};
use tokio::{sync::Notify, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let (cache, sweeper) = build_cache(&cache_config)?;

    let source = Arc::new(HttpItemSource::from_settings(&settings.origin)?);
    let fetcher = Arc::new(TreeFetcher::new(
        source,
        FetcherConfig {
            comment_timeout: settings.origin.comment_timeout,
            list_limit: settings.origin.list_limit.get() as usize,
            list_concurrency: settings.origin.list_concurrency.get() as usize,
        },
    ));

    let state = HttpState {
        fetcher,
        cache,
        max_page: settings.origin.max_page.get() as usize,
    };

    let result = serve_http(&settings, state).await;

    if let Some(handle) = sweeper {
        handle.abort();
        let _ = handle.await;
    }

    result
}

fn build_cache(
    config: &CacheConfig,
) -> Result<(ResultCache, Option<JoinHandle<()>>), AppError> {
    match config.backend() {
        BackendKind::Redis(url) => {
            let hook: ConnectErrorHook = Arc::new(|err| {
                error!(target = "hnproxy::cache", error = %err, "redis error");
            });
            let backend = RedisBackend::connect(&url, hook)
                .map_err(|err| InfraError::configuration(format!("cache.redis_url: {err}")))?;
            info!(target = "hnproxy::cache", "using redis cache");
            Ok((ResultCache::new(Arc::new(backend), config.ttl), None))
        }
        BackendKind::Memory => {
            let backend = Arc::new(MemoryBackend::new(config.max_keys));
            let sweeper = spawn_sweeper(Arc::clone(&backend), config.sweep_interval);
            info!(
                target = "hnproxy::cache",
                max_keys = config.max_keys,
                "using memory cache"
            );
            Ok((ResultCache::new(backend, config.ttl), Some(sweeper)))
        }
    }
}

fn spawn_sweeper(backend: Arc<MemoryBackend>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let purged = backend.purge_expired();
            if purged > 0 {
                info!(
                    target = "hnproxy::cache",
                    purged,
                    remaining = backend.key_count(),
                    "expired cache entries purged"
                );
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(
        state,
        RouterOptions {
            request_timeout: settings.server.request_timeout,
            log: LogOptions {
                referer: settings.logging.referer,
                user_agent: settings.logging.user_agent,
            },
        },
    );

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "listening");

    let shutdown = Arc::new(Notify::new());
    let trigger = Arc::clone(&shutdown);
    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { trigger.notified().await })
        .await
    });

    tokio::select! {
        joined = &mut server => return server_result(joined),
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutdown requested");
        }
    }

    shutdown.notify_one();
    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            warn!(
                grace_seconds = settings.server.graceful_shutdown.as_secs(),
                "in-flight requests still running after grace period"
            );
            Ok(())
        }
    }
}

fn server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(result) => result.map_err(|err| AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}
