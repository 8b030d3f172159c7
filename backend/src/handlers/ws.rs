//! WebSocket handler: registers the connection, pumps its outbound queue into the socket and
//! hands inbound frames to the command dispatcher until the socket closes.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, trace};

use crate::dispatcher::InboundFrame;
use crate::AppState;

impl From<Message> for InboundFrame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => InboundFrame::Text(text.as_str().to_owned()),
            Message::Binary(bytes) => InboundFrame::Binary(bytes.to_vec()),
            Message::Ping(_) => InboundFrame::Ping,
            Message::Pong(_) => InboundFrame::Pong,
            Message::Close(_) => InboundFrame::Close,
        }
    }
}

/// GET /ws — upgrade and serve the generator protocol.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (entry, rx) = state.registry.register();
    let conn_id = entry.conn_id;
    state.metrics.open_connections.set(state.registry.len() as i64);
    info!(conn_id = %conn_id, "ws connected");

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_outbound(sink, rx));

    let inbound = stream.map(|frame| frame.map(InboundFrame::from));
    state.dispatcher.run(entry, inbound).await;

    // Every sender is gone once the dispatcher has torn down, so the writer drains and exits.
    if let Err(e) = writer.await {
        tracing::warn!(conn_id = %conn_id, "ws writer join: {}", e);
    }
}

async fn write_outbound<S>(mut sink: S, mut rx: mpsc::Receiver<String>)
where
    S: Sink<Message> + Unpin,
{
    while let Some(text) = rx.recv().await {
        if sink.send(Message::Text(text.into())).await.is_err() {
            trace!("ws write failed, closing writer");
            return;
        }
    }
    let close = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: "connection closed".into(),
    }));
    if sink.send(close).await.is_err() {
        trace!("ws close frame not delivered");
    }
}
