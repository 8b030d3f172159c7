//! Per-connection receive loop: parses command frames and routes them to the generation supervisor.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::generation::GenerationSupervisor;
use crate::metrics::Metrics;
use crate::protocol::{Command, OutboundMessage};
use crate::ws_registry::{ConnectionEntry, ConnectionRegistry};

/// Transport-independent view of an inbound WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pong,
    Close,
}

/// How the receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveExit {
    /// Client sent a close frame.
    Closed,
    /// Stream ended without a close frame.
    Ended,
    /// Reading the next frame failed.
    TransportError,
    /// Our side of the socket went away.
    SocketClosed,
}

pub struct CommandDispatcher {
    registry: Arc<ConnectionRegistry>,
    supervisor: Arc<GenerationSupervisor>,
    metrics: Arc<Metrics>,
}

impl CommandDispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        supervisor: Arc<GenerationSupervisor>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            supervisor,
            metrics,
        }
    }

    /// Serve one connection until it closes, then tear down its generation and unregister it.
    pub async fn run<S, E>(&self, conn: Arc<ConnectionEntry>, mut inbound: S) -> ReceiveExit
    where
        S: Stream<Item = Result<InboundFrame, E>> + Unpin,
        E: fmt::Display,
    {
        let conn_id = conn.conn_id;
        let connected_at = conn.connected_at;
        let exit = self.receive_loop(&conn, &mut inbound).await;
        drop(conn);

        self.supervisor.teardown(conn_id).await;
        self.registry.unregister(conn_id);
        self.metrics.open_connections.set(self.registry.len() as i64);
        info!(
            conn_id = %conn_id,
            ?exit,
            connected_secs = (Utc::now() - connected_at).num_seconds(),
            "ws connection closed"
        );
        exit
    }

    async fn receive_loop<S, E>(&self, conn: &ConnectionEntry, inbound: &mut S) -> ReceiveExit
    where
        S: Stream<Item = Result<InboundFrame, E>> + Unpin,
        E: fmt::Display,
    {
        loop {
            if !conn.is_open() {
                return ReceiveExit::SocketClosed;
            }
            let next = tokio::select! {
                biased;
                _ = conn.closed() => return ReceiveExit::SocketClosed,
                next = inbound.next() => next,
            };
            match next {
                Some(Ok(InboundFrame::Text(text))) => self.handle_text(conn, &text).await,
                Some(Ok(InboundFrame::Close)) => return ReceiveExit::Closed,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(conn_id = %conn.conn_id, "ws read: {}", e);
                    return ReceiveExit::TransportError;
                }
                None => return ReceiveExit::Ended,
            }
        }
    }

    async fn handle_text(&self, conn: &ConnectionEntry, text: &str) {
        match Command::parse(text) {
            Ok(command) => self.dispatch(conn, command).await,
            Err(e) => {
                self.metrics.malformed_frames.inc();
                warn!(conn_id = %conn.conn_id, "{}", e);
            }
        }
    }

    async fn dispatch(&self, conn: &ConnectionEntry, command: Command) {
        match command {
            Command::Start => {
                self.supervisor.start(conn.conn_id).await;
            }
            Command::Stop => {
                self.supervisor.stop(conn.conn_id).await;
            }
            Command::Ping => match OutboundMessage::pong().to_text() {
                Ok(text) => {
                    if let Err(e) = conn.try_send(text) {
                        debug!("pong: {}", e);
                    }
                }
                Err(e) => warn!(conn_id = %conn.conn_id, "serialize pong: {:?}", e),
            },
            Command::Unknown(action) => {
                info!(conn_id = %conn.conn_id, action = %action, "unknown ws action");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogStore;
    use crate::generation::GenerationSettings;
    use crate::protocol::{ACTION_NEW_GAME, ACTION_PONG, ACTION_STARTED};
    use futures::channel::mpsc::{unbounded, UnboundedSender};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    type Frames = UnboundedSender<Result<InboundFrame, String>>;

    struct Harness {
        registry: Arc<ConnectionRegistry>,
        supervisor: Arc<GenerationSupervisor>,
        metrics: Arc<Metrics>,
        conn: Arc<ConnectionEntry>,
        outbound: mpsc::Receiver<String>,
        frames: Frames,
        task: JoinHandle<ReceiveExit>,
    }

    fn connect() -> Harness {
        let registry = Arc::new(ConnectionRegistry::default());
        let metrics = Arc::new(Metrics::new().unwrap());
        let supervisor = Arc::new(GenerationSupervisor::new(
            registry.clone(),
            Arc::new(CatalogStore::new()),
            metrics.clone(),
            GenerationSettings::default(),
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            registry.clone(),
            supervisor.clone(),
            metrics.clone(),
        ));

        let (conn, outbound) = registry.register();
        let (frames, inbound) = unbounded();
        let task = {
            let conn = conn.clone();
            tokio::spawn(async move { dispatcher.run(conn, inbound).await })
        };
        Harness {
            registry,
            supervisor,
            metrics,
            conn,
            outbound,
            frames,
            task,
        }
    }

    fn text(frames: &Frames, body: &str) {
        frames
            .unbounded_send(Ok(InboundFrame::Text(body.to_string())))
            .unwrap();
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(text) = rx.try_recv() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }

    fn actions(messages: &[OutboundMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.action.as_str()).collect()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn ping_without_generation_answers_once() {
        let mut h = connect();

        text(&h.frames, r#"{"action":"ping","data":""}"#);
        settle().await;

        assert_eq!(actions(&drain(&mut h.outbound)), vec![ACTION_PONG]);
        assert!(!h.supervisor.is_active(h.conn.conn_id));
    }

    #[tokio::test(start_paused = true)]
    async fn ping_does_not_interrupt_generation() {
        let mut h = connect();

        text(&h.frames, r#"{"action":"start","data":""}"#);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        text(&h.frames, r#"{"action":"ping","data":""}"#);
        tokio::time::sleep(Duration::from_millis(1_000)).await;

        let messages = drain(&mut h.outbound);
        let seen = actions(&messages);
        assert_eq!(seen[0], ACTION_STARTED);
        assert_eq!(seen.iter().filter(|a| **a == ACTION_PONG).count(), 1);
        assert_eq!(seen.iter().filter(|a| **a == ACTION_NEW_GAME).count(), 3);
        assert_eq!(seen.last(), Some(&ACTION_NEW_GAME));
        assert!(h.supervisor.is_active(h.conn.conn_id));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frame_keeps_connection_usable() {
        let mut h = connect();

        text(&h.frames, "this is not json");
        text(&h.frames, r#"{"data":"missing action"}"#);
        text(&h.frames, r#"{"action":"start","data":""}"#);
        settle().await;

        let messages = drain(&mut h.outbound);
        assert_eq!(actions(&messages)[..2], [ACTION_STARTED, ACTION_NEW_GAME]);
        assert_eq!(h.metrics.malformed_frames.get(), 2);
        assert!(!h.task.is_finished());
        assert!(h.registry.lookup(h.conn.conn_id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_action_is_ignored() {
        let mut h = connect();

        text(&h.frames, r#"{"action":"dance","data":""}"#);
        text(&h.frames, r#"{"action":"PING","data":""}"#);
        settle().await;

        assert_eq!(actions(&drain(&mut h.outbound)), vec![ACTION_PONG]);
        assert_eq!(h.metrics.malformed_frames.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pings_from_a_client_that_never_reads_do_not_stall_the_loop() {
        let h = connect();

        // Well past the outbound queue capacity; nobody drains `h.outbound`.
        for _ in 0..200 {
            text(&h.frames, r#"{"action":"ping","data":""}"#);
        }
        h.frames.unbounded_send(Ok(InboundFrame::Close)).unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(5), h.task)
            .await
            .expect("receive loop stalled on a full outbound queue")
            .unwrap();
        assert_eq!(exit, ReceiveExit::Closed);
        assert!(h.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_tears_everything_down_once() {
        let h = connect();
        let conn_id = h.conn.conn_id;

        text(&h.frames, r#"{"action":"start","data":""}"#);
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert!(h.supervisor.is_active(conn_id));

        h.frames
            .unbounded_send(Err("connection reset".to_string()))
            .unwrap();
        let exit = h.task.await.unwrap();

        assert_eq!(exit, ReceiveExit::TransportError);
        assert!(!h.supervisor.is_active(conn_id));
        assert_eq!(h.supervisor.active_count(), 0);
        assert!(h.registry.lookup(conn_id).is_none());
        assert!(h.registry.is_empty());
        assert_eq!(h.metrics.open_connections.get(), 0);
        // Cleanup already ran; a second pass finds nothing.
        assert!(!h.supervisor.teardown(conn_id).await);
        assert!(!h.registry.unregister(conn_id));
    }

    #[tokio::test(start_paused = true)]
    async fn close_frame_ends_the_loop() {
        let mut h = connect();

        text(&h.frames, r#"{"action":"start","data":""}"#);
        settle().await;
        h.frames.unbounded_send(Ok(InboundFrame::Close)).unwrap();
        let exit = h.task.await.unwrap();

        assert_eq!(exit, ReceiveExit::Closed);
        assert_eq!(h.supervisor.active_count(), 0);
        drain(&mut h.outbound);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(h.outbound.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn premature_end_of_stream_is_a_disconnect() {
        let h = connect();
        let conn_id = h.conn.conn_id;

        drop(h.frames);
        let exit = h.task.await.unwrap();

        assert_eq!(exit, ReceiveExit::Ended);
        assert!(h.registry.lookup(conn_id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_socket_ends_the_loop_while_idle() {
        let h = connect();
        let conn_id = h.conn.conn_id;

        drop(h.outbound);
        let exit = h.task.await.unwrap();

        assert_eq!(exit, ReceiveExit::SocketClosed);
        assert!(h.registry.lookup(conn_id).is_none());
        drop(h.frames);
    }
}
