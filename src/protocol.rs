//! Wire envelope and message types (§6).
//!
//! Grounded on the teacher's `shared::protocol` message enums (`LobbyMessage`,
//! `GameMessage`), but re-cast as a single `{"type": ..., "payload": ...}` JSON
//! envelope over a text WebSocket frame instead of a bincode-over-UDP channel.

use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Incoming client intents, tagged by `type` with the rest of the object as payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    CreateGame { player_id: String, player_name: String },
    #[serde(rename_all = "camelCase")]
    JoinGame {
        game_id: String,
        player_id: String,
        player_name: String,
    },
    #[serde(rename_all = "camelCase")]
    StartGame { game_id: String, player_id: String },
    #[serde(rename_all = "camelCase")]
    RollDice { game_id: String, player_id: String },
    #[serde(rename_all = "camelCase")]
    MovePiece {
        game_id: String,
        player_id: String,
        piece_id: u32,
    },
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        game_id: String,
        player_id: String,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    LeaveGame { game_id: String, player_id: String },
    #[serde(rename_all = "camelCase")]
    ResetGame { game_id: String, player_id: String },
    #[serde(rename_all = "camelCase")]
    ForceSync { game_id: String, player_id: String },
}

/// Server → client frames. `gameStateUpdate` carries the full session snapshot;
/// `error` is addressed to a single caller only (§4.6, §7).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    GameStateUpdate { payload: Session },
    Error { payload: ErrorPayload },
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl ServerMessage {
    pub fn snapshot(session: &Session) -> Self {
        ServerMessage::GameStateUpdate { payload: session.clone() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            payload: ErrorPayload {
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_roll_dice_envelope() {
        let raw = r#"{"type":"rollDice","gameId":"ABC123","playerId":"p1"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::RollDice { game_id, player_id } => {
                assert_eq!(game_id, "ABC123");
                assert_eq!(player_id, "p1");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unknown_type_fails_to_decode() {
        let raw = r#"{"type":"doSomethingWeird","gameId":"ABC123"}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }

    #[test]
    fn error_message_serializes_with_tag() {
        let msg = ServerMessage::error("It's not your turn!");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("It's not your turn!"));
    }
}
