//! Message Dispatcher (§4.5): decodes incoming envelopes, routes by `type`, validates
//! preconditions, and delegates to the Rule Engine / Turn Controller / Session State.
//!
//! Malformed frames and unknown message types are dropped silently (logged at
//! `tracing::warn!` / `debug!` respectively); this is the only place that sees raw
//! wire bytes.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::broadcast::{broadcast_snapshot, send_error_to};
use crate::error::GameError;
use crate::protocol::ClientMessage;
use crate::registry::{ConnId, Outbox, Registry};
use crate::turn;

/// Parses and routes one inbound text frame from `conn`. `outbox` is this connection's
/// own sender, used for replies that must go to the caller alone (§4.6, §7).
pub async fn dispatch(registry: &Arc<Registry>, conn: ConnId, outbox: &Outbox, raw: &str) {
    let message: ClientMessage = match serde_json::from_str(raw) {
        Ok(m) => m,
        Err(err) => {
            warn!(%err, "dropping malformed frame");
            return;
        }
    };

    match message {
        ClientMessage::CreateGame { player_id, player_name } => {
            let room = registry.create(player_id.clone(), player_name).await;
            let session = room.lock().await;
            registry
                .bind(conn, player_id, session.game_id.clone(), outbox.clone())
                .await;
            broadcast_snapshot(registry, &session).await;
        }

        ClientMessage::JoinGame {
            game_id,
            player_id,
            player_name,
        } => {
            let Some(room) = registry.get(&game_id).await else {
                send_error_to(outbox, GameError::NotFound(game_id).message());
                return;
            };
            let mut session = room.lock().await;
            if let Err(err) = session.join(player_id.clone(), player_name, false) {
                send_error_to(outbox, err.message());
                return;
            }
            info!(game_id = %session.game_id, player_id = %player_id, "player joined");
            registry.bind(conn, player_id, game_id, outbox.clone()).await;
            broadcast_snapshot(registry, &session).await;
        }

        ClientMessage::StartGame { game_id, player_id } => {
            let Some(room) = registry.get(&game_id).await else {
                send_error_to(outbox, GameError::NotFound(game_id).message());
                return;
            };
            if let Err(err) = turn::start_game(registry, room, &player_id).await {
                send_error_to(outbox, err.message());
            }
        }

        ClientMessage::RollDice { game_id, player_id } => {
            let Some(room) = registry.get(&game_id).await else {
                send_error_to(outbox, GameError::NotFound(game_id).message());
                return;
            };
            if let Err(err) = turn::roll_dice(registry, room, &player_id).await {
                send_error_to(outbox, err.message());
            }
        }

        ClientMessage::MovePiece {
            game_id,
            player_id,
            piece_id,
        } => {
            let Some(room) = registry.get(&game_id).await else {
                send_error_to(outbox, GameError::NotFound(game_id).message());
                return;
            };
            if let Err(err) = turn::move_piece(registry, room, &player_id, piece_id).await {
                send_error_to(outbox, err.message());
            }
        }

        ClientMessage::ChatMessage {
            game_id,
            player_id,
            text,
        } => {
            let Some(room) = registry.get(&game_id).await else {
                send_error_to(outbox, GameError::NotFound(game_id).message());
                return;
            };
            let mut session = room.lock().await;
            if !session.is_seated(&player_id) {
                debug!(player_id, "chat from unseated player dropped");
                return;
            }
            session.push_chat(&player_id, text);
            broadcast_snapshot(registry, &session).await;
        }

        ClientMessage::LeaveGame { game_id, player_id } => {
            handle_leave(registry, &game_id, &player_id).await;
            registry.unbind(conn).await;
        }

        ClientMessage::ResetGame { game_id, player_id } | ClientMessage::ForceSync { game_id, player_id } => {
            let Some(room) = registry.get(&game_id).await else {
                send_error_to(outbox, GameError::NotFound(game_id).message());
                return;
            };
            let is_host = room.lock().await.host_id == player_id;
            if !is_host {
                return; // silent ignore: no defined error for this precondition
            }
            turn::advance_turn_now(registry, room).await;
        }
    }
}

/// Marks `player_id` removed in `game_id`, advancing the turn if it was theirs.
/// Shared by the explicit `leaveGame` intent and the WebSocket close path (§8 scenario 7).
pub async fn handle_leave(registry: &Arc<Registry>, game_id: &str, player_id: &str) {
    let Some(room) = registry.get(game_id).await else {
        return;
    };
    let mut session = room.lock().await;
    let Some(player) = session.player_mut(player_id) else {
        return;
    };
    if player.is_removed {
        return; // idempotent: already handled
    }
    player.is_removed = true;
    let was_current = session.current_turn_player_id == player_id;
    if was_current {
        // advance_turn_now re-acquires the room lock itself; release ours first.
        drop(session);
        turn::advance_turn_now(registry, room).await;
    } else {
        broadcast_snapshot(registry, &session).await;
    }
}

/// Cleans up a dropped connection: looks up its binding, marks the player removed,
/// and unbinds. Idempotent (§5: "connection close is idempotent").
pub async fn handle_disconnect(registry: &Arc<Registry>, conn: ConnId) {
    if let Some(binding) = registry.lookup(conn).await {
        handle_leave(registry, &binding.game_id, &binding.player_id).await;
    }
    registry.unbind(conn).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    async fn new_conn_outbox() -> (ConnId, Outbox, mpsc::UnboundedReceiver<crate::protocol::ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnId(uuid::Uuid::new_v4()), tx, rx)
    }

    #[tokio::test]
    async fn create_game_replies_to_caller_only() {
        let registry = Arc::new(Registry::new());
        let (conn, outbox, mut rx) = new_conn_outbox().await;
        dispatch(
            &registry,
            conn,
            &outbox,
            r#"{"type":"createGame","playerId":"p1","playerName":"Alice"}"#,
        )
        .await;
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_without_reply() {
        let registry = Arc::new(Registry::new());
        let (conn, outbox, mut rx) = new_conn_outbox().await;
        dispatch(&registry, conn, &outbox, "not json").await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_type_is_dropped_without_reply() {
        let registry = Arc::new(Registry::new());
        let (conn, outbox, mut rx) = new_conn_outbox().await;
        dispatch(&registry, conn, &outbox, r#"{"type":"doBarrelRoll"}"#).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_to_full_room_sends_error() {
        let registry = Arc::new(Registry::new());
        let room = registry.create("p1".into(), "Alice".into()).await;
        let game_id = room.lock().await.game_id.clone();
        for (id, name) in [("p2", "Bob"), ("p3", "Carol"), ("p4", "Dave")] {
            room.lock().await.join(id.into(), name.into(), false).unwrap();
        }

        let (conn, outbox, mut rx) = new_conn_outbox().await;
        let payload = format!(
            r#"{{"type":"joinGame","gameId":"{}","playerId":"p5","playerName":"Eve"}}"#,
            game_id
        );
        dispatch(&registry, conn, &outbox, &payload).await;

        match rx.try_recv().unwrap() {
            crate::protocol::ServerMessage::Error { payload } => {
                assert_eq!(payload.message, "This game is full.");
            }
            _ => panic!("expected error frame"),
        }
    }

    #[tokio::test]
    async fn leave_game_marks_removed_and_advances_turn() {
        let registry = Arc::new(Registry::new());
        let room = registry.create("p1".into(), "Alice".into()).await;
        room.lock().await.join("p2".into(), "Bob".into(), false).unwrap();
        room.lock().await.start();
        let game_id = room.lock().await.game_id.clone();

        let (conn, outbox, _rx) = new_conn_outbox().await;
        registry.bind(conn, "p1".into(), game_id.clone(), outbox.clone()).await;

        handle_leave(&registry, &game_id, "p1").await;
        let session = room.lock().await;
        assert!(session.player("p1").unwrap().is_removed);
        assert_eq!(session.current_turn_player_id, "p2");
    }
}
