//! The in-memory per-room record (§3, §4.2) and its passive accessors.
//!
//! `Session` is a plain data record: every mutation is driven by [`crate::turn`] or
//! [`crate::dispatch`] on the room's serialized handling path. This module owns no
//! timers and performs no I/O; it only knows how to construct itself, accept new
//! players, and produce the wire snapshot.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::rules::{Color, Piece};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    Setup,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub player_id: String,
    pub name: String,
    pub color: Color,
    pub text: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub player_id: String,
    pub name: String,
    pub color: Color,
    pub seat_index: usize,
    pub pieces: [Piece; 4],
    pub has_finished: bool,
    pub inactive_turns: u32,
    pub is_removed: bool,
    pub is_host: bool,
}

impl Player {
    fn new(player_id: String, name: String, color: Color, seat_index: usize, is_host: bool) -> Self {
        let base = seat_index as u32 * 4;
        Player {
            player_id,
            name,
            color,
            seat_index,
            pieces: [
                Piece::new(base, color),
                Piece::new(base + 1, color),
                Piece::new(base + 2, color),
                Piece::new(base + 3, color),
            ],
            has_finished: false,
            inactive_turns: 0,
            is_removed: false,
            is_host,
        }
    }
}

/// A single game room, keyed by `game_id`. Mutated only on the room's serialized
/// handling path; see `crate::registry` for how access is synchronized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub game_id: String,
    pub host_id: String,
    pub players: Vec<Player>,
    pub current_player_index: usize,
    pub current_turn_player_id: String,
    pub dice_value: Option<i32>,
    pub game_status: GameStatus,
    pub winner: Option<String>,
    pub message: String,
    pub movable_pieces: Vec<u32>,
    pub is_rolling: bool,
    pub is_animating: bool,
    pub turn_time_left: u32,
    pub chat_messages: Vec<ChatMessage>,

    /// Monotonic counter bumped whenever the current turn ends, so in-flight timers
    /// (roll resolution, auto-pass, the optional watchdog) can detect staleness (§5).
    #[serde(skip)]
    pub epoch: u64,
    #[serde(skip)]
    next_chat_id: u64,
}

impl Session {
    pub fn new(game_id: String, host_id: String, host_name: String) -> Self {
        Session {
            game_id,
            host_id: host_id.clone(),
            players: Vec::new(),
            current_player_index: 0,
            current_turn_player_id: String::new(),
            dice_value: None,
            game_status: GameStatus::Setup,
            winner: None,
            message: format!("Waiting for players to join {}'s game.", host_name),
            movable_pieces: Vec::new(),
            is_rolling: false,
            is_animating: false,
            turn_time_left: 30,
            chat_messages: Vec::new(),
            epoch: 0,
            next_chat_id: 0,
        }
        .with_host_joined(host_id.clone(), host_name)
    }

    fn with_host_joined(mut self, host_id: String, host_name: String) -> Self {
        self.join(host_id, host_name, true)
            .expect("fresh session always has room for its host");
        self
    }

    pub fn is_seated(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p.player_id == player_id)
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.player_id == player_id)
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_player_index)
    }

    /// Seats a new player in the next canonical color slot, or re-binds an existing
    /// (not removed) seat. Returns `Err` if the room is full and the player is new.
    pub fn join(
        &mut self,
        player_id: String,
        name: String,
        is_host: bool,
    ) -> Result<(), crate::error::GameError> {
        if self.is_seated(&player_id) {
            return Ok(());
        }
        if self.players.len() >= 4 {
            return Err(crate::error::GameError::Full);
        }
        let seat_index = self.players.len();
        let color = Color::ORDER[seat_index];
        self.players
            .push(Player::new(player_id, name, color, seat_index, is_host));
        Ok(())
    }

    pub fn start(&mut self) {
        self.game_status = GameStatus::Playing;
        self.current_player_index = 0;
        if let Some(first) = self.players.first() {
            self.current_turn_player_id = first.player_id.clone();
            self.message = format!("{}'s turn.", first.name);
        }
    }

    /// Moves `current_player_index` to the next non-removed seat and refreshes the
    /// per-turn advisory fields. A no-op if every player is removed.
    pub fn advance_turn(&mut self) {
        self.epoch += 1;
        self.dice_value = None;
        self.is_rolling = false;
        self.movable_pieces.clear();

        if self.players.iter().all(|p| p.is_removed) {
            return;
        }
        let n = self.players.len();
        let mut next = self.current_player_index;
        for _ in 0..n {
            next = (next + 1) % n;
            if !self.players[next].is_removed {
                break;
            }
        }
        self.current_player_index = next;
        self.current_turn_player_id = self.players[next].player_id.clone();
        self.turn_time_left = 30;
        self.message = format!("{}'s turn.", self.players[next].name);
    }

    /// Grants the current player another turn without advancing the seat (bonus turns).
    pub fn grant_bonus_turn(&mut self) {
        self.epoch += 1;
        self.dice_value = None;
        self.is_rolling = false;
        self.movable_pieces.clear();
    }

    pub fn push_chat(&mut self, player_id: &str, text: String) {
        let Some(player) = self.player(player_id) else {
            return;
        };
        let name = player.name.clone();
        let color = player.color;
        let id = self.next_chat_id;
        self.next_chat_id += 1;
        self.chat_messages.push(ChatMessage {
            id,
            player_id: player_id.to_string(),
            name,
            color,
            text,
            timestamp: Utc::now().timestamp_millis(),
        });
    }

    pub fn finish_if_won(&mut self, player_id: &str) {
        let Some(player) = self.player_mut(player_id) else {
            return;
        };
        if !crate::rules::has_finished(&player.pieces) {
            return;
        }
        player.has_finished = true;
        let name = player.name.clone();
        self.game_status = GameStatus::Finished;
        self.winner = Some(player_id.to_string());
        self.message = format!("{} wins!", name);
    }
}

/// Allocates a fresh 6-character uppercase base36 room id. Collisions against
/// `existing` are retried (§4.4).
pub fn generate_game_id(mut existing: impl FnMut(&str) -> bool) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    loop {
        let mut rng = rand::rng();
        let code: String = (0..6)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect();
        if !existing(&code) {
            return code;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_seats_host_in_red() {
        let session = Session::new("ABC123".into(), "p1".into(), "Alice".into());
        assert_eq!(session.players.len(), 1);
        assert_eq!(session.players[0].color, Color::Red);
        assert!(session.players[0].is_host);
    }

    #[test]
    fn join_assigns_canonical_color_order() {
        let mut session = Session::new("ABC123".into(), "p1".into(), "Alice".into());
        session.join("p2".into(), "Bob".into(), false).unwrap();
        session.join("p3".into(), "Carol".into(), false).unwrap();
        session.join("p4".into(), "Dave".into(), false).unwrap();

        let colors: Vec<Color> = session.players.iter().map(|p| p.color).collect();
        assert_eq!(colors, vec![Color::Red, Color::Green, Color::Yellow, Color::Blue]);
    }

    #[test]
    fn fifth_join_is_rejected() {
        let mut session = Session::new("ABC123".into(), "p1".into(), "Alice".into());
        session.join("p2".into(), "Bob".into(), false).unwrap();
        session.join("p3".into(), "Carol".into(), false).unwrap();
        session.join("p4".into(), "Dave".into(), false).unwrap();
        assert!(session.join("p5".into(), "Eve".into(), false).is_err());
    }

    #[test]
    fn rejoin_by_seated_player_is_a_noop() {
        let mut session = Session::new("ABC123".into(), "p1".into(), "Alice".into());
        session.join("p1".into(), "Alice".into(), true).unwrap();
        assert_eq!(session.players.len(), 1);
    }

    #[test]
    fn advance_turn_skips_removed_players() {
        let mut session = Session::new("ABC123".into(), "p1".into(), "Alice".into());
        session.join("p2".into(), "Bob".into(), false).unwrap();
        session.join("p3".into(), "Carol".into(), false).unwrap();
        session.start();
        session.player_mut("p2").unwrap().is_removed = true;
        session.advance_turn();
        assert_eq!(session.current_turn_player_id, "p3");
    }

    #[test]
    fn generate_game_id_retries_on_collision() {
        let mut seen = false;
        let id = generate_game_id(|_| {
            if seen {
                false
            } else {
                seen = true;
                true
            }
        });
        assert_eq!(id.len(), 6);
    }
}
