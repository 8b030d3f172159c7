use std::net::SocketAddr;
use std::sync::Arc;

use game_catalog_backend::catalog::{seed, GameGenerator};
use game_catalog_backend::config::Config;
use game_catalog_backend::generation::GenerationSupervisor;
use game_catalog_backend::{build_router, AppState};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "game_catalog_backend=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::from_env()?;
    let state = AppState::from_config(&config)?;
    seed::seed_catalog(
        &state.catalog,
        &GameGenerator::new(config.max_id_attempts),
        config.seed_games,
    )?;

    let addr: SocketAddr = config.socket_addr_string().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        interval_ms = config.generation_interval.as_millis() as u64,
        timeout_secs = config.generation_timeout.as_secs(),
        "game catalog backend listening"
    );

    let supervisor = state.supervisor.clone();
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal(supervisor))
        .await?;
    Ok(())
}

async fn shutdown_signal(supervisor: Arc<GenerationSupervisor>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("listen for ctrl-c: {:?}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
    supervisor.shutdown().await;
}
