//! UCI (Universal Chess Interface) protocol grammar.
//!
//! This crate covers the GUI side of the protocol: the commands a GUI sends to
//! an analysis engine and the lines it has to understand coming back.
//!
//! # Commands sent
//!
//! - `uci`, `ucinewgame`, `isready` - Handshake
//! - `position startpos [moves <move>...]` - Set position
//! - `go movetime <ms> [searchmoves <move>...]` - Start search
//! - `stop` - Stop search
//! - `quit` - Exit engine
//!
//! # Lines understood
//!
//! - `uciok`, `readyok`
//! - `bestmove <move> [ponder <move>]` or `bestmove (none)`
//! - `info ... depth <d> ... nps <n> ... score (cp|mate) <v> [upperbound|lowerbound] ... pv <moves>`
//!
//! Anything else parses to no events, so verbose engines never break a session.

mod command;
mod event;
mod score;

pub use command::{GoOptions, GuiCommand};
pub use event::{is_move_token, BestMove, EngineEvent, ScoreInfo, SearchInfo};
pub use score::{Score, ScoreKind};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}
