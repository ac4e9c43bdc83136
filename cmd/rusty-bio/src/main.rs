//! # Rusty-Bio Binary
//!
//! Assembles storage, services and the HTTP surface from `Settings`.

use anyhow::Context;
use api_adapters::{router, AppState, Metrics};
use configs::Settings;
use domains::{Clock, EventStore, MonotonicClock, PageRepo};
use services::{
    AnalyticsService, BlockService, IngestionQuotas, IngestionService, PageService, Quota, RateLimiter,
};
use std::sync::Arc;
use storage_adapters::MemoryStore;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    init_tracing(&settings);

    let (pages_repo, events) = storage(&settings).await?;
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let limiter = RateLimiter::start(clock.clone(), settings.rate_limit.sweep_interval());
    let quotas = IngestionQuotas {
        views: Quota { max_requests: settings.rate_limit.view_max, window: settings.rate_limit.view_window() },
        clicks: Quota { max_requests: settings.rate_limit.click_max, window: settings.rate_limit.click_window() },
    };
    let timeout = settings.storage.timeout();

    let ingestion = Arc::new(IngestionService::new(events.clone(), limiter, clock.clone(), quotas));
    let state = AppState {
        pages: Arc::new(PageService::new(pages_repo.clone(), ingestion.clone(), clock.clone(), timeout)),
        blocks: Arc::new(BlockService::new(pages_repo.clone(), clock.clone(), timeout)),
        analytics: Arc::new(AnalyticsService::new(events, pages_repo, clock, timeout)),
        ingestion,
        metrics: Arc::new(Metrics::new()),
        storage_timeout: timeout,
    };

    let addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "rusty-bio listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

type Stores = (Arc<dyn PageRepo>, Arc<dyn EventStore>);

#[cfg(feature = "db-postgres")]
async fn storage(settings: &Settings) -> anyhow::Result<Stores> {
    use secrecy::ExposeSecret;

    let Some(url) = &settings.database.url else {
        return Ok(in_memory());
    };
    let store = storage_adapters::PgStore::connect(url.expose_secret(), settings.database.max_connections)
        .await
        .context("failed to connect to postgres")?;
    tracing::info!(max_connections = settings.database.max_connections, "using postgres storage");

    let store = Arc::new(store);
    let pages: Arc<dyn PageRepo> = store.clone();
    let events: Arc<dyn EventStore> = store;
    Ok((pages, events))
}

#[cfg(not(feature = "db-postgres"))]
async fn storage(settings: &Settings) -> anyhow::Result<Stores> {
    if settings.database.url.is_some() {
        tracing::warn!("database url set but postgres support is not compiled in");
    }
    Ok(in_memory())
}

fn in_memory() -> Stores {
    tracing::info!("using in-memory storage, data is lost on restart");
    let store = Arc::new(MemoryStore::new());
    let pages: Arc<dyn PageRepo> = store.clone();
    let events: Arc<dyn EventStore> = store;
    (pages, events)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received ctrl-c"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
