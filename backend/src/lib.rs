//! Game catalog backend: in-memory catalog plus a live game generator served over WebSocket.

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod generation;
pub mod handlers;
pub mod metrics;
pub mod protocol;
pub mod ws_registry;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::catalog::CatalogStore;
use crate::config::Config;
use crate::dispatcher::CommandDispatcher;
use crate::generation::{GenerationSettings, GenerationSupervisor};
use crate::metrics::Metrics;
use crate::ws_registry::ConnectionRegistry;

/// Process-lifetime state shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub catalog: Arc<CatalogStore>,
    pub supervisor: Arc<GenerationSupervisor>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        settings: GenerationSettings,
        outbound_buffer: usize,
    ) -> Result<Self, prometheus::Error> {
        let registry = Arc::new(ConnectionRegistry::new(outbound_buffer));
        let catalog = Arc::new(CatalogStore::new());
        let metrics = Arc::new(Metrics::new()?);
        let supervisor = Arc::new(GenerationSupervisor::new(
            registry.clone(),
            catalog.clone(),
            metrics.clone(),
            settings,
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            registry.clone(),
            supervisor.clone(),
            metrics.clone(),
        ));
        Ok(Self {
            registry,
            catalog,
            supervisor,
            dispatcher,
            metrics,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, prometheus::Error> {
        Self::new(config.generation_settings(), config.outbound_buffer)
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::health::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
