//! Live games shared between peers.
//!
//! - [`GameRegistry`] holds every game this process knows, hands out ids and
//!   folds peers' snapshots into the local set.
//! - [`PeerEvent`] is the wire vocabulary: `move`, `add`, `synchronize`.
//! - [`Room`] broadcasts those events to every member but the sender.
//!
//! Merges are full replacements keyed by id, so applying the same snapshot
//! twice, or out of order with other snapshots, converges on the last one.

mod protocol;
mod registry;
mod room;

pub use protocol::PeerEvent;
pub use registry::{GameId, GameRegistry, GameSnapshot, MergeReport, SharedGame};
pub use room::{Envelope, MemberId, Room, RoomMember, RoomPublisher, DEFAULT_ROOM_CAPACITY};

use chess_game::{PgnError, PositionError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("no game with id {0}")]
    UnknownGame(GameId),
    #[error(transparent)]
    IllegalMove(#[from] PositionError),
    #[error(transparent)]
    InvalidPgn(#[from] PgnError),
    #[error("{0}")]
    Payload(String),
    #[error("invalid synchronize payload: {0}")]
    Json(#[from] serde_json::Error),
}
