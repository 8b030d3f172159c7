//! Prometheus metrics owned by `AppState` and rendered at `/metrics`.

use prometheus::{IntCounter, IntGauge, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub open_connections: IntGauge,
    pub active_generations: IntGauge,
    pub games_generated: IntCounter,
    pub malformed_frames: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let open_connections =
            IntGauge::new("catalog_open_connections", "Open WebSocket connections")?;
        let active_generations = IntGauge::new(
            "catalog_active_generations",
            "Generation loops currently running",
        )?;
        let games_generated = IntCounter::new(
            "catalog_games_generated_total",
            "Games fabricated by generation loops",
        )?;
        let malformed_frames = IntCounter::new(
            "catalog_malformed_frames_total",
            "Inbound frames that could not be parsed as a command",
        )?;

        registry.register(Box::new(open_connections.clone()))?;
        registry.register(Box::new(active_generations.clone()))?;
        registry.register(Box::new(games_generated.clone()))?;
        registry.register(Box::new(malformed_frames.clone()))?;

        Ok(Self {
            registry,
            open_connections,
            active_generations,
            games_generated,
            malformed_frames,
        })
    }

    /// Text exposition format of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}
