//! Chess games as move histories.
//!
//! A [`Position`] is the sequence of half-moves played from the standard
//! starting position. Everything else (side to move, legality, outcome, PGN)
//! is derived from that history. Board rules come from `shakmaty`.
//!
//! ```
//! use chess_game::{GameOutcome, Position};
//!
//! let mut game = Position::new();
//! for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
//!     game.play(mv.parse().unwrap()).unwrap();
//! }
//! assert_eq!(game.outcome(), GameOutcome::BlackWin);
//! assert_eq!(game.to_pgn(), "1. f3 e5 2. g4 Qh4# 0-1");
//! ```

mod half_move;
mod pgn;
mod position;

pub use half_move::HalfMove;
pub use position::{DrawReason, GameOutcome, PlayedMove, Position, DEFAULT_PROMOTION};
pub use shakmaty::{Color, Role, Square};

use thiserror::Error;

/// Errors from playing moves.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("invalid move notation: {0}")]
    InvalidMove(String),
    #[error("illegal move: {0}")]
    IllegalMove(String),
    #[error("game has already ended")]
    GameOver,
    #[error("no move to take back")]
    NothingToUndo,
}

/// Errors from reading PGN.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PgnError {
    #[error("illegal move '{san}' at ply {ply}")]
    IllegalMove { ply: usize, san: String },
    #[error("unreadable PGN: {0}")]
    Unreadable(String),
    #[error("games from a custom start position are not supported: {0}")]
    CustomStart(String),
}
