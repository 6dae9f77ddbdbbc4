//! Pure board rules: piece advancement, movability, capture and win detection.
//!
//! Nothing in this module touches a [`Session`](crate::session::Session) or performs I/O;
//! every function is a total, deterministic transform over plain values so the turn
//! controller can call it freely without worrying about hidden state.

use serde::{Deserialize, Serialize};

/// Offset at which home-stretch positions begin. A piece's `position` is either
/// `-1` (Home), `1..=52` (shared loop) or `FINISH_START..=FINISH_START+5` (home stretch).
pub const FINISH_START: i32 = 100;
pub const HOME_STRETCH_LEN: i32 = 6;
pub const LOOP_LEN: i32 = 52;

pub const SAFE_SQUARES: [i32; 8] = [1, 9, 14, 22, 27, 35, 40, 48];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Red,
    Blue,
    Yellow,
}

impl Color {
    /// Canonical seating order: the order colors are handed out as players join.
    pub const ORDER: [Color; 4] = [Color::Red, Color::Green, Color::Yellow, Color::Blue];

    pub fn start_square(self) -> i32 {
        match self {
            Color::Green => 1,
            Color::Red => 14,
            Color::Blue => 27,
            Color::Yellow => 40,
        }
    }

    pub fn pre_home_square(self) -> i32 {
        match self {
            Color::Green => 51,
            Color::Red => 12,
            Color::Blue => 25,
            Color::Yellow => 38,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PieceState {
    Home,
    Active,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Piece {
    pub id: u32,
    pub color: Color,
    pub state: PieceState,
    pub position: i32,
}

impl Piece {
    pub fn new(id: u32, color: Color) -> Self {
        Piece {
            id,
            color,
            state: PieceState::Home,
            position: -1,
        }
    }
}

pub fn is_safe_square(square: i32) -> bool {
    SAFE_SQUARES.contains(&square)
}

/// Computes where `piece` would land if its owner rolled `dice`, without mutating it.
/// Returns `(position, state)` unchanged from the input when the move is illegal.
pub fn advance(piece: &Piece, dice: i32) -> (i32, PieceState) {
    if dice == 0 {
        return (piece.position, piece.state);
    }

    match piece.state {
        PieceState::Home => {
            if dice == 6 {
                (piece.color.start_square(), PieceState::Active)
            } else {
                (piece.position, piece.state)
            }
        }
        PieceState::Finished => (piece.position, piece.state),
        PieceState::Active if piece.position >= FINISH_START => {
            let k = piece.position - FINISH_START;
            let k_next = k + dice;
            if k_next < HOME_STRETCH_LEN {
                let state = if k_next == HOME_STRETCH_LEN - 1 {
                    PieceState::Finished
                } else {
                    PieceState::Active
                };
                (FINISH_START + k_next, state)
            } else {
                (piece.position, piece.state)
            }
        }
        PieceState::Active => {
            let dist_to_pre_home =
                (piece.color.pre_home_square() - piece.position).rem_euclid(LOOP_LEN);
            if dice > dist_to_pre_home {
                let stretch_index = dice - dist_to_pre_home - 1;
                if stretch_index < HOME_STRETCH_LEN {
                    let state = if stretch_index == HOME_STRETCH_LEN - 1 {
                        PieceState::Finished
                    } else {
                        PieceState::Active
                    };
                    (FINISH_START + stretch_index, state)
                } else {
                    (piece.position, piece.state)
                }
            } else {
                (((piece.position - 1 + dice).rem_euclid(LOOP_LEN)) + 1, PieceState::Active)
            }
        }
    }
}

/// Whether `advance` would actually move the piece (as opposed to returning it unchanged).
fn would_move(piece: &Piece, dice: i32) -> bool {
    let (pos, state) = advance(piece, dice);
    pos != piece.position || state != piece.state
}

/// Computes the set of piece ids belonging to `pieces` that can legally move with `dice`,
/// applying the blockade rule: a destination shared-loop square already holding two or
/// more of the player's own pieces cannot receive a third.
pub fn movable_pieces(pieces: &[Piece], dice: i32) -> Vec<u32> {
    let mut result = Vec::new();
    for piece in pieces {
        if piece.state == PieceState::Finished {
            continue;
        }
        if !would_move(piece, dice) {
            continue;
        }
        let (dest, _) = advance(piece, dice);
        if dest < FINISH_START {
            let occupants = pieces
                .iter()
                .filter(|p| p.id != piece.id && p.state == PieceState::Active && p.position == dest)
                .count();
            if occupants >= 2 {
                continue;
            }
        }
        result.push(piece.id);
    }
    result
}

/// Resolves captures once a mover's piece has already been advanced onto `dest`.
/// Every opposing `Active` piece occupying `dest` is sent Home, unless `dest` is safe.
/// Returns the ids of captured pieces.
pub fn resolve_capture(pieces: &mut [Piece], mover_color: Color, dest: i32) -> Vec<u32> {
    if dest >= FINISH_START || is_safe_square(dest) {
        return Vec::new();
    }
    let mut captured = Vec::new();
    for piece in pieces.iter_mut() {
        if piece.color != mover_color && piece.state == PieceState::Active && piece.position == dest
        {
            piece.state = PieceState::Home;
            piece.position = -1;
            captured.push(piece.id);
        }
    }
    captured
}

pub fn has_finished(pieces: &[Piece]) -> bool {
    pieces.iter().all(|p| p.state == PieceState::Finished)
}
