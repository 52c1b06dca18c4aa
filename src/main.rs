//! Livestream Swarm 부하 생성기

use anyhow::Context;
use livestream_swarm::backend::HttpBackend;
use livestream_swarm::transport::SocketIoTransport;
use livestream_swarm::{handlers, AppState, Config, PoolController, PoolSettings, SessionContext};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let session = SessionContext::from_config(&config)
        .context("APP_UUID and VIEWER_* must be configured")?;
    let backend = HttpBackend::new(&config.backend).context("failed to build HTTP backend")?;

    let pool = Arc::new(PoolController::new(
        Arc::new(session),
        Arc::new(SocketIoTransport::new()),
        Arc::new(backend),
        PoolSettings::from_config(&config),
    ));
    let state = Arc::new(AppState::new(config.clone(), pool.clone()));

    if config.pool.auto_connect {
        state.start_pool(config.pool.size);
    }

    let app = handlers::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("🚀 Livestream Swarm started");
    tracing::info!("Control API: http://{}", addr);
    tracing::info!("Backend: {}", config.backend.base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("control API server failed")?;

    pool.close_all();
    tracing::info!("Livestream Swarm stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
