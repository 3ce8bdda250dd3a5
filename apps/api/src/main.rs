mod backend;
mod config;
mod errors;
mod lifecycle;
mod notice;
mod queue;
mod routes;
mod state;
#[cfg(test)]
mod testutil;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::backend::HttpBackend;
use crate::config::Config;
use crate::lifecycle::LifecycleManager;
use crate::notice::NoticeBoard;
use crate::queue::QueuePoller;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Outreach API v{}", env!("CARGO_PKG_VERSION"));

    // One HTTP client for every backend collaborator
    let backend = Arc::new(HttpBackend::new(
        config.backend_url.clone(),
        config.request_timeout,
    ));
    info!(backend = %config.backend_url, "backend client initialized");

    let notices = NoticeBoard::new(config.notice_ttl);
    let lifecycle = Arc::new(LifecycleManager::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        config.sender.clone(),
        notices.clone(),
    ));

    // The poller runs beside the server for the life of the process; its
    // first refresh fires at startup.
    let poller = Arc::new(QueuePoller::new(
        lifecycle.clone(),
        backend.clone(),
        notices.clone(),
        config.poll_interval,
    ));
    poller.start();
    info!(interval_secs = config.poll_interval.as_secs(), "approval queue poller started");

    let state = AppState {
        lifecycle,
        poller,
        pipeline: backend,
        notices,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
