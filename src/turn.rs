//! Turn Controller (§4.3): the state machine driving a single player's turn through
//! RollPending → Rolling → Rolled → (Moving | AutoPass) → next.
//!
//! Every timed transition captures the room's epoch at enqueue time and re-checks it
//! after the delay; a mismatch means the turn already ended some other way, and the
//! timer no-ops (§5). This is the only module that calls `tokio::spawn`/`tokio::time::sleep`.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::info;

use crate::broadcast::broadcast_snapshot;
use crate::error::GameError;
use crate::registry::{RoomHandle, Registry};
use crate::rules::{advance, movable_pieces, resolve_capture};
use crate::session::GameStatus;

const ROLL_RESOLUTION_DELAY: Duration = Duration::from_millis(1000);
const AUTO_PASS_DELAY: Duration = Duration::from_millis(1500);
const TURN_WATCHDOG_DELAY: Duration = Duration::from_secs(30);

/// Transitions Setup → Playing (host only) and schedules the watchdog for the first
/// turn, the same way every later turn-advance does (§4.3, §5).
pub async fn start_game(
    registry: &Arc<Registry>,
    room: RoomHandle,
    caller: &str,
) -> Result<(), GameError> {
    let epoch = {
        let mut session = room.lock().await;
        if session.host_id != caller {
            return Err(GameError::NotHost);
        }
        if session.game_status != GameStatus::Setup {
            return Ok(()); // silent ignore: already started
        }
        session.start();
        info!(game_id = %session.game_id, "game started");
        broadcast_snapshot(registry, &session).await;
        session.epoch
    };
    schedule_watchdog(registry, room, epoch);
    Ok(())
}

/// Enters Rolling: validates the caller may roll, flips `isRolling`, broadcasts
/// immediately, and schedules roll resolution 1000ms later (§4.3).
pub async fn roll_dice(
    registry: &Arc<Registry>,
    room: RoomHandle,
    caller: &str,
) -> Result<(), GameError> {
    let epoch = {
        let mut session = room.lock().await;
        if session.game_status != GameStatus::Playing {
            return Err(GameError::NotYourTurn);
        }
        if session.current_turn_player_id != caller {
            return Err(GameError::NotYourTurn);
        }
        if session.is_rolling || session.dice_value.is_some() {
            // Silent ignore per §7: a racing duplicate roll attempt.
            return Ok(());
        }
        session.is_rolling = true;
        info!(game_id = %session.game_id, player_id = %caller, "rolling dice");
        broadcast_snapshot(registry, &session).await;
        session.epoch
    };

    let registry = registry.clone();
    tokio::spawn(async move {
        tokio::time::sleep(ROLL_RESOLUTION_DELAY).await;
        resolve_roll(&registry, room, epoch, || rand::rng().random_range(1..=6)).await;
    });
    Ok(())
}

/// Resolves a pending roll: picks a dice value via `roll_fn`, computes movability for
/// the current player, and either waits for `movePiece` or schedules an auto-pass.
/// Exposed with an injectable `roll_fn` so callers (notably tests) can stub randomness.
async fn resolve_roll(registry: &Arc<Registry>, room: RoomHandle, epoch: u64, roll_fn: impl FnOnce() -> i32) {
    let (next_epoch, auto_pass) = {
        let mut session = room.lock().await;
        if session.epoch != epoch || !session.is_rolling {
            return;
        }
        let dice = roll_fn();
        session.dice_value = Some(dice);
        session.is_rolling = false;

        let current = match session.current_player() {
            Some(p) => p.pieces.to_vec(),
            None => return,
        };
        let movable = movable_pieces(&current, dice);
        session.movable_pieces = movable.clone();

        let auto_pass = movable.is_empty();
        session.message = if auto_pass {
            format!("No moves available, rolled {}.", dice)
        } else {
            format!("Rolled {}. Move a piece.", dice)
        };
        broadcast_snapshot(registry, &session).await;
        (session.epoch, auto_pass)
    };

    if auto_pass {
        let registry = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(AUTO_PASS_DELAY).await;
            end_turn_if_current(&registry, room, next_epoch).await;
        });
    }
}

/// Applies a `movePiece` action: advances the named piece, resolves captures, checks
/// for a win, then either grants a bonus turn or advances the turn (§4.3 Moving state).
pub async fn move_piece(
    registry: &Arc<Registry>,
    room: RoomHandle,
    caller: &str,
    piece_id: u32,
) -> Result<(), GameError> {
    let watchdog_epoch = {
        let mut session = room.lock().await;
        if session.game_status != GameStatus::Playing {
            return Err(GameError::NotYourTurn);
        }
        if session.current_turn_player_id != caller {
            return Err(GameError::NotYourTurn);
        }
        let Some(dice) = session.dice_value else {
            return Ok(()); // silent ignore: no pending roll
        };
        if !session.movable_pieces.contains(&piece_id) {
            return Ok(()); // silent ignore: not a legal piece this roll
        }

        let mover_color = session
            .player(caller)
            .and_then(|p| p.pieces.iter().find(|pc| pc.id == piece_id))
            .map(|p| p.color);
        let Some(mover_color) = mover_color else {
            return Ok(());
        };

        let dest = {
            let player = session.player_mut(caller).expect("caller is seated");
            let piece = player
                .pieces
                .iter_mut()
                .find(|p| p.id == piece_id)
                .expect("piece_id validated against movablePieces");
            let (dest, new_state) = advance(piece, dice);
            piece.position = dest;
            piece.state = new_state;
            dest
        };

        // resolve_capture needs a flat view across every player's pieces; copy out,
        // mutate, then write the (possibly captured) pieces back in place.
        let mut flat: Vec<crate::rules::Piece> = session
            .players
            .iter()
            .flat_map(|p| p.pieces.iter().cloned())
            .collect();
        let captured = resolve_capture(&mut flat, mover_color, dest);
        for player in session.players.iter_mut() {
            for piece in player.pieces.iter_mut() {
                if let Some(updated) = flat.iter().find(|p| p.id == piece.id) {
                    *piece = updated.clone();
                }
            }
        }

        session.finish_if_won(caller);

        let bonus = dice == 6 || !captured.is_empty();
        if session.game_status == GameStatus::Finished {
            info!(game_id = %session.game_id, winner = ?session.winner, "game finished");
            session.epoch += 1;
        } else if bonus {
            info!(game_id = %session.game_id, player_id = %caller, piece_id, "bonus turn granted");
            session.grant_bonus_turn();
        } else {
            session.advance_turn();
            info!(game_id = %session.game_id, player_id = %session.current_turn_player_id, "turn advanced");
        }

        let watchdog_epoch = session.epoch;
        broadcast_snapshot(registry, &session).await;
        watchdog_epoch
    };

    schedule_watchdog(registry, room, watchdog_epoch);
    Ok(())
}

/// Advances the turn unconditionally (used by `leaveGame`, `resetGame`, `forceSync`,
/// and disconnect handling) and schedules the optional 30s watchdog for the new turn.
pub async fn advance_turn_now(registry: &Arc<Registry>, room: RoomHandle) {
    let epoch = {
        let mut session = room.lock().await;
        session.advance_turn();
        info!(game_id = %session.game_id, player_id = %session.current_turn_player_id, "turn advanced");
        broadcast_snapshot(registry, &session).await;
        session.epoch
    };
    schedule_watchdog(registry, room, epoch);
}

fn schedule_watchdog(registry: &Arc<Registry>, room: RoomHandle, epoch: u64) {
    let registry = registry.clone();
    tokio::spawn(async move {
        tokio::time::sleep(TURN_WATCHDOG_DELAY).await;
        end_turn_if_current(&registry, room, epoch).await;
    });
}

async fn end_turn_if_current(registry: &Arc<Registry>, room: RoomHandle, epoch: u64) {
    let advanced = {
        let mut session = room.lock().await;
        if session.epoch != epoch || session.game_status != GameStatus::Playing {
            return;
        }
        session.advance_turn();
        info!(game_id = %session.game_id, player_id = %session.current_turn_player_id, "turn auto-passed");
        broadcast_snapshot(registry, &session).await;
        session.epoch
    };
    schedule_watchdog(registry, room, advanced);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use std::sync::Arc;

    async fn registry_with_two_players() -> (Arc<Registry>, RoomHandle) {
        let registry = Arc::new(Registry::new());
        let room = registry.create("p1".into(), "Alice".into()).await;
        room.lock()
            .await
            .join("p2".into(), "Bob".into(), false)
            .unwrap();
        room.lock().await.start();
        (registry, room)
    }

    #[tokio::test]
    async fn start_game_rejects_non_host() {
        let registry = Arc::new(Registry::new());
        let room = registry.create("p1".into(), "Alice".into()).await;
        room.lock().await.join("p2".into(), "Bob".into(), false).unwrap();
        let result = start_game(&registry, room, "p2").await;
        assert!(matches!(result, Err(GameError::NotHost)));
    }

    #[tokio::test]
    async fn start_game_transitions_to_playing_and_seats_first_player() {
        let registry = Arc::new(Registry::new());
        let room = registry.create("p1".into(), "Alice".into()).await;
        room.lock().await.join("p2".into(), "Bob".into(), false).unwrap();
        start_game(&registry, room.clone(), "p1").await.unwrap();
        let session = room.lock().await;
        assert_eq!(session.game_status, GameStatus::Playing);
        assert_eq!(session.current_turn_player_id, "p1");
    }

    #[tokio::test]
    async fn roll_dice_rejects_non_current_player() {
        let (registry, room) = registry_with_two_players().await;
        let result = roll_dice(&registry, room, "p2").await;
        assert!(matches!(result, Err(GameError::NotYourTurn)));
    }

    #[tokio::test]
    async fn roll_dice_sets_is_rolling() {
        let (registry, room) = registry_with_two_players().await;
        roll_dice(&registry, room.clone(), "p1").await.unwrap();
        assert!(room.lock().await.is_rolling);
    }

    #[tokio::test]
    async fn duplicate_roll_is_silently_ignored() {
        let (registry, room) = registry_with_two_players().await;
        roll_dice(&registry, room.clone(), "p1").await.unwrap();
        let before = room.lock().await.epoch;
        roll_dice(&registry, room.clone(), "p1").await.unwrap();
        assert_eq!(room.lock().await.epoch, before);
    }

    #[tokio::test]
    async fn resolve_roll_with_six_lists_home_pieces_movable() {
        let (registry, room) = registry_with_two_players().await;
        let epoch = room.lock().await.epoch;
        room.lock().await.is_rolling = true;
        resolve_roll(&registry, room.clone(), epoch, || 6).await;
        let session = room.lock().await;
        assert_eq!(session.dice_value, Some(6));
        assert_eq!(session.movable_pieces.len(), 4);
    }

    #[tokio::test]
    async fn move_piece_rejects_piece_not_in_movable_set() {
        let (registry, room) = registry_with_two_players().await;
        let epoch = room.lock().await.epoch;
        room.lock().await.is_rolling = true;
        resolve_roll(&registry, room.clone(), epoch, || 3).await;
        // All pieces Home with dice=3: movable_pieces is empty.
        let result = move_piece(&registry, room.clone(), "p1", 0).await;
        assert!(result.is_ok());
        assert_eq!(room.lock().await.current_turn_player_id, "p1");
    }

    #[tokio::test]
    async fn auto_pass_advances_turn_after_no_moves() {
        let (registry, room) = registry_with_two_players().await;
        let epoch = room.lock().await.epoch;
        room.lock().await.is_rolling = true;
        // All pieces Home with dice=3: no legal move, so resolve_roll leaves an
        // auto-pass pending for the captured epoch rather than spawning it itself.
        resolve_roll(&registry, room.clone(), epoch, || 3).await;
        assert!(room.lock().await.movable_pieces.is_empty());
        let pending_epoch = room.lock().await.epoch;

        // Drives the same transition the spawned 1500ms timer would have applied.
        end_turn_if_current(&registry, room.clone(), pending_epoch).await;

        let session = room.lock().await;
        assert_eq!(session.current_turn_player_id, "p2");
        assert!(session.dice_value.is_none());
    }

    #[tokio::test]
    async fn stale_epoch_timer_is_ignored() {
        let (registry, room) = registry_with_two_players().await;
        let epoch = room.lock().await.epoch;
        room.lock().await.is_rolling = true;
        resolve_roll(&registry, room.clone(), epoch, || 3).await;
        let pending_epoch = room.lock().await.epoch;

        // The turn already ended some other way (a move, a leave, a reset) before the
        // timer fires: bump the epoch and plant a sentinel the timer must not touch.
        {
            let mut session = room.lock().await;
            session.epoch += 1;
            session.dice_value = Some(9);
        }

        end_turn_if_current(&registry, room.clone(), pending_epoch).await;

        let session = room.lock().await;
        assert_eq!(session.dice_value, Some(9));
        assert_eq!(session.current_turn_player_id, "p1");
    }

    #[tokio::test]
    async fn move_piece_grants_bonus_on_six() {
        let (registry, room) = registry_with_two_players().await;
        let epoch = room.lock().await.epoch;
        room.lock().await.is_rolling = true;
        resolve_roll(&registry, room.clone(), epoch, || 6).await;
        move_piece(&registry, room.clone(), "p1", 0).await.unwrap();
        let session = room.lock().await;
        assert_eq!(session.current_turn_player_id, "p1");
        assert!(session.dice_value.is_none());
    }
}
