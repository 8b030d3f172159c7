//! WebSocket connection registry: maps connection id to the outbound channel of its socket writer task.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Capacity of each connection's outbound queue when none is configured.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Opaque, globally unique identifier assigned when a socket connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
    #[error("outbound queue of connection {0} is full")]
    Full(ConnectionId),
}

/// Per-connection state: sender that feeds the socket writer task.
#[derive(Debug)]
pub struct ConnectionEntry {
    pub conn_id: ConnectionId,
    pub tx: mpsc::Sender<String>,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionEntry {
    /// True while the writer side (the socket) still accepts messages.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Resolves once the socket writer has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Queue a text frame for the socket. Waits when the queue is full.
    pub async fn send(&self, text: String) -> Result<(), SendError> {
        self.tx
            .send(text)
            .await
            .map_err(|_| SendError::Closed(self.conn_id))
    }

    /// Queue a text frame without waiting. Fails with `Full` when the client is not draining.
    pub fn try_send(&self, text: String) -> Result<(), SendError> {
        self.tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full(self.conn_id),
            mpsc::error::TrySendError::Closed(_) => SendError::Closed(self.conn_id),
        })
    }
}

/// Registry of live WebSocket connections. Thread-safe; shared via Arc.
pub struct ConnectionRegistry {
    inner: DashMap<ConnectionId, Arc<ConnectionEntry>>,
    outbound_buffer: usize,
}

impl ConnectionRegistry {
    pub fn new(outbound_buffer: usize) -> Self {
        Self {
            inner: DashMap::new(),
            outbound_buffer: outbound_buffer.max(1),
        }
    }

    /// Register a new connection under a fresh id. Returns the entry and the receiver the
    /// socket writer drains. Caller must call `unregister(conn_id)` when the socket closes.
    pub fn register(&self) -> (Arc<ConnectionEntry>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        let entry = Arc::new(ConnectionEntry {
            conn_id: ConnectionId::new(),
            tx,
            connected_at: Utc::now(),
        });
        self.inner.insert(entry.conn_id, entry.clone());
        (entry, rx)
    }

    /// Remove a connection. Returns false when it was already gone.
    pub fn unregister(&self, conn_id: ConnectionId) -> bool {
        self.inner.remove(&conn_id).is_some()
    }

    /// Look up a connection. `None` is normal once teardown has run.
    pub fn lookup(&self, conn_id: ConnectionId) -> Option<Arc<ConnectionEntry>> {
        self.inner.get(&conn_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_BUFFER)
    }
}
