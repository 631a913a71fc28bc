//! Social ingestion service: binary entrypoint.
//! Loads sources, starts the scheduler and serves the control API until
//! Ctrl-C / SIGTERM, then stops every task before exiting.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use social_ingest::config::{AppConfig, LogFormat};
use social_ingest::ingest::config::load_sources_default;
use social_ingest::metrics::Metrics;
use social_ingest::{AdapterRegistry, AppState, MemoryStore, Scheduler, ScraperService};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("social_ingest=info,warn"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?e, "installing Ctrl-C handler failed");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "installing SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cfg = AppConfig::from_env()?;
    init_tracing(cfg.log_format);
    // Before anything records or describes a metric.
    let metrics = Metrics::install()?;

    let sources = load_sources_default().context("loading source definitions")?;
    tracing::info!(count = sources.len(), "sources loaded");

    let store = Arc::new(MemoryStore::with_sources(sources));
    let registry = AdapterRegistry::with_defaults(&cfg.http_settings())?;
    tracing::info!(platforms = ?registry.platforms(), "adapters registered");

    let service = Arc::new(ScraperService::new(store, registry));
    let scheduler = Arc::new(Scheduler::new(service));
    if cfg.scheduler_enabled {
        scheduler.start().await?;
    } else {
        tracing::info!("scheduler disabled; use POST /scheduler/start");
    }

    let app = social_ingest::router(AppState {
        scheduler: scheduler.clone(),
    })
    .merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    scheduler.stop().await;
    tracing::info!("bye");
    Ok(())
}
