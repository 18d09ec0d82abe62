use serde::{Deserialize, Serialize};

use crate::game::GameView;

/// Client -> Server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Ping,
    /// Ask for a fresh snapshot, e.g. after the app returns to the foreground
    Sync,
}

/// Server -> Client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage<'a> {
    GameUpdate { game: &'a GameView },
    Pong { t: i64 },
    Error { message: String },
}

impl ServerMessage<'_> {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
