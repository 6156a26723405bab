//! Engine-backed analysis of chess games shared between peers.
//!
//! [`Analyst`] ties the pieces together: games live in a
//! [`game_sync::GameRegistry`], moves are judged through a
//! [`chess_analysis::Correlator`] talking to a UCI engine started by
//! [`ProcessTransport`], and changes travel to peers through a
//! [`game_sync::Room`].

mod analyst;
pub mod config;
pub mod transport;

pub use analyst::{Analyst, MoveReport, PlaySettings};
pub use config::{AnalystConfig, ConfigError};
pub use transport::{ProcessTransport, TransportError};

use chess_analysis::AnalysisError;
use chess_game::{PgnError, PositionError};
use game_sync::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalystError {
    #[error(transparent)]
    Move(#[from] PositionError),
    #[error(transparent)]
    Pgn(#[from] PgnError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}
