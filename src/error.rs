//! Error taxonomy for the dispatcher boundary.
//!
//! [`GameError`] covers the "precondition failure" kind from the error design: every
//! variant carries the exact user-visible message the spec requires, and nothing else
//! ever crosses the serialized room boundary as an error. Transport-level failures
//! (socket setup, accept loop) use `anyhow` instead, one layer up in `main.rs`/`ws.rs`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Game {0} not found.")]
    NotFound(String),

    #[error("This game is full.")]
    Full,

    #[error("Only the host can start.")]
    NotHost,

    #[error("It's not your turn!")]
    NotYourTurn,
}

impl GameError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}
