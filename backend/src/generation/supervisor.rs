//! Owns at most one generation task per connection and starts, replaces and stops them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::worker::{self, GenerationContext, LoopExit};
use super::GenerationSettings;
use crate::catalog::{CatalogStore, GameGenerator};
use crate::metrics::Metrics;
use crate::protocol::OutboundMessage;
use crate::ws_registry::{ConnectionEntry, ConnectionId, ConnectionRegistry};

type TaskTable = DashMap<ConnectionId, GenerationTask>;

/// A running (or just finished) loop and the token that ends it.
struct GenerationTask {
    /// Distinguishes this loop from any later replacement on the same connection.
    seq: u64,
    cancel: CancellationToken,
    handle: JoinHandle<LoopExit>,
}

impl GenerationTask {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    async fn cancel_and_join(self, conn_id: ConnectionId) -> Option<LoopExit> {
        self.cancel.cancel();
        match self.handle.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                warn!(conn_id = %conn_id, "generation task join: {}", e);
                None
            }
        }
    }
}

pub struct GenerationSupervisor {
    tasks: Arc<TaskTable>,
    next_seq: AtomicU64,
    registry: Arc<ConnectionRegistry>,
    catalog: Arc<CatalogStore>,
    metrics: Arc<Metrics>,
    settings: GenerationSettings,
    /// Parent of every task token; cancelled on server shutdown.
    shutdown: CancellationToken,
}

impl GenerationSupervisor {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        catalog: Arc<CatalogStore>,
        metrics: Arc<Metrics>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            next_seq: AtomicU64::new(0),
            registry,
            catalog,
            metrics,
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Start generating for the connection, replacing any loop it already has.
    /// Returns false when the connection is no longer registered.
    pub async fn start(&self, conn_id: ConnectionId) -> bool {
        let Some(conn) = self.registry.lookup(conn_id) else {
            debug!(conn_id = %conn_id, "start for unknown connection");
            return false;
        };

        // The previous loop must be gone before the new one can send anything.
        if let Some((_, previous)) = self.tasks.remove(&conn_id) {
            let exit = previous.cancel_and_join(conn_id).await;
            debug!(conn_id = %conn_id, ?exit, "replaced generation loop");
        }

        send_best_effort(&conn, OutboundMessage::started());

        let cancel = self.shutdown.child_token();
        let ctx = GenerationContext {
            conn,
            catalog: self.catalog.clone(),
            generator: GameGenerator::new(self.settings.max_id_attempts),
            metrics: self.metrics.clone(),
            interval: self.settings.interval,
        };
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let metrics = self.metrics.clone();
        let tasks = self.tasks.clone();
        let timeout = self.settings.timeout;
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            metrics.active_generations.inc();
            let exit = worker::run_with_timeout(ctx, loop_cancel, timeout).await;
            metrics.active_generations.dec();
            if release_own_entry(&tasks, conn_id, seq) {
                debug!(conn_id = %conn_id, seq, "finished loop released its entry");
            }
            info!(conn_id = %conn_id, ?exit, "generation loop ended");
            exit
        });

        self.tasks.insert(
            conn_id,
            GenerationTask {
                seq,
                cancel,
                handle,
            },
        );
        // A loop that finished before it was recorded found nothing to release.
        self.tasks
            .remove_if(&conn_id, |_, task| task.seq == seq && !task.is_running());
        info!(conn_id = %conn_id, "generation started");
        true
    }

    /// Stop the connection's loop and confirm with `stopped` if the socket is still open.
    /// Returns false (and sends nothing) when no loop is running.
    pub async fn stop(&self, conn_id: ConnectionId) -> bool {
        let Some((_, task)) = self.tasks.remove(&conn_id) else {
            debug!(conn_id = %conn_id, "stop without active generation");
            return false;
        };
        if !task.is_running() {
            let exit = task.cancel_and_join(conn_id).await;
            debug!(conn_id = %conn_id, ?exit, "stop after generation already ended");
            return false;
        }

        task.cancel_and_join(conn_id).await;
        info!(conn_id = %conn_id, "generation stopped");

        if let Some(conn) = self.registry.lookup(conn_id) {
            if conn.is_open() {
                send_best_effort(&conn, OutboundMessage::stopped());
            }
        }
        true
    }

    /// Cancel and discard the connection's loop without messaging it. Call once per connection exit.
    pub async fn teardown(&self, conn_id: ConnectionId) -> bool {
        match self.tasks.remove(&conn_id) {
            Some((_, task)) => {
                let exit = task.cancel_and_join(conn_id).await;
                debug!(conn_id = %conn_id, ?exit, "generation torn down");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, conn_id: ConnectionId) -> bool {
        self.tasks
            .get(&conn_id)
            .is_some_and(|task| task.is_running())
    }

    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_running()).count()
    }

    /// Cancel every loop and wait for all of them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let conn_ids: Vec<ConnectionId> = self.tasks.iter().map(|t| *t.key()).collect();
        for conn_id in conn_ids {
            if let Some((_, task)) = self.tasks.remove(&conn_id) {
                task.cancel_and_join(conn_id).await;
            }
        }
        info!("generation supervisor shut down");
    }
}

/// Remove the connection's entry only while it still belongs to loop `seq`.
fn release_own_entry(tasks: &TaskTable, conn_id: ConnectionId, seq: u64) -> bool {
    tasks.remove_if(&conn_id, |_, task| task.seq == seq).is_some()
}

/// Confirmations never wait on a client that has stopped reading.
fn send_best_effort(conn: &ConnectionEntry, message: OutboundMessage) {
    let text = match message.to_text() {
        Ok(text) => text,
        Err(e) => {
            warn!(conn_id = %conn.conn_id, "serialize {}: {:?}", message.action, e);
            return;
        }
    };
    if let Err(e) = conn.try_send(text) {
        debug!("{}: {}", message.action, e);
    }
}
