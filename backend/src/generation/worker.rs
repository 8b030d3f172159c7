use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::catalog::{CatalogStore, GameGenerator};
use crate::metrics::Metrics;
use crate::protocol::OutboundMessage;
use crate::ws_registry::ConnectionEntry;

/// Why a generation loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    TimedOut,
    /// The socket closed under the loop.
    Disconnected,
    /// No free id could be found.
    Failed,
}

pub(crate) struct GenerationContext {
    pub conn: Arc<ConnectionEntry>,
    pub catalog: Arc<CatalogStore>,
    pub generator: GameGenerator,
    pub metrics: Arc<Metrics>,
    pub interval: Duration,
}

/// Run the loop until `cancel` fires or `timeout` elapses, whichever comes first.
pub(crate) async fn run_with_timeout(
    ctx: GenerationContext,
    cancel: CancellationToken,
    timeout: Duration,
) -> LoopExit {
    match tokio::time::timeout(timeout, run_generation_loop(&ctx, &cancel)).await {
        Ok(exit) => exit,
        Err(_) => {
            cancel.cancel();
            LoopExit::TimedOut
        }
    }
}

async fn run_generation_loop(ctx: &GenerationContext, cancel: &CancellationToken) -> LoopExit {
    let conn_id = ctx.conn.conn_id;
    let mut rng = StdRng::from_os_rng();

    loop {
        if cancel.is_cancelled() {
            return LoopExit::Cancelled;
        }
        if !ctx.conn.is_open() {
            return LoopExit::Disconnected;
        }

        let snapshot = ctx.catalog.game_ids();
        let company_ids = ctx.catalog.company_ids();
        let game = match ctx.generator.generate(&mut rng, &snapshot, &company_ids) {
            Ok(game) => game,
            Err(e) => {
                error!(conn_id = %conn_id, "generate game: {}", e);
                return LoopExit::Failed;
            }
        };
        let game = ctx.catalog.upsert_game(game);
        ctx.metrics.games_generated.inc();

        let text = match OutboundMessage::new_game(&game).and_then(|m| m.to_text()) {
            Ok(text) => text,
            Err(e) => {
                error!(conn_id = %conn_id, game_id = game.id, "serialize game: {:?}", e);
                return LoopExit::Failed;
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return LoopExit::Cancelled,
            sent = ctx.conn.send(text) => {
                if sent.is_err() {
                    debug!(conn_id = %conn_id, game_id = game.id, "socket closed before newGame");
                    return LoopExit::Disconnected;
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return LoopExit::Cancelled,
            _ = tokio::time::sleep(ctx.interval) => {}
        }
    }
}
