//! WebSocket wire format: inbound `{"action", "data"}` commands and outbound `{"action", "data"}` events.

use serde::{Deserialize, Serialize};

use crate::catalog::Game;

pub const ACTION_STARTED: &str = "started";
pub const ACTION_STOPPED: &str = "stopped";
pub const ACTION_PONG: &str = "pong";
pub const ACTION_NEW_GAME: &str = "newGame";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed command frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Inbound envelope. `data` is accepted in any shape and ignored.
#[derive(Deserialize)]
struct InboundMessage {
    action: String,
}

/// Commands a client can send. Action names are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Ping,
    Unknown(String),
}

impl Command {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let message: InboundMessage = serde_json::from_str(text)?;
        Ok(Self::from_action(&message.action))
    }

    fn from_action(action: &str) -> Self {
        match action.to_lowercase().as_str() {
            "start" => Command::Start,
            "stop" => Command::Stop,
            "ping" => Command::Ping,
            _ => Command::Unknown(action.to_string()),
        }
    }
}

/// Outbound envelope. `data` is a plain string; for `newGame` it holds the JSON-encoded game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub action: String,
    pub data: String,
}

impl OutboundMessage {
    fn new(action: &str, data: impl Into<String>) -> Self {
        Self {
            action: action.to_string(),
            data: data.into(),
        }
    }

    pub fn started() -> Self {
        Self::new(ACTION_STARTED, "Game generation started")
    }

    pub fn stopped() -> Self {
        Self::new(ACTION_STOPPED, "Game generation stopped")
    }

    pub fn pong() -> Self {
        Self::new(ACTION_PONG, "pong")
    }

    pub fn new_game(game: &Game) -> Result<Self, serde_json::Error> {
        Ok(Self::new(ACTION_NEW_GAME, serde_json::to_string(game)?))
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
