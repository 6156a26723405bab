//! Events exchanged between peers sharing a room.
//!
//! Every event travels as a name plus a text payload:
//!
//! | name          | payload                                  |
//! |---------------|------------------------------------------|
//! | `move`        | `<gameId>,<from>,<to>[,<promotion>]`     |
//! | `add`         | the new game's PGN                       |
//! | `synchronize` | JSON array of `{"id": .., "pgn": ..}`    |

use crate::registry::{GameId, GameSnapshot};
use crate::SyncError;
use chess_game::{HalfMove, Role, Square};

/// A peer event, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A move played in an existing game.
    Move { game_id: GameId, mv: HalfMove },
    /// A peer created a game.
    Add { pgn: String },
    /// A peer's full registry.
    Synchronize(Vec<GameSnapshot>),
}

impl PeerEvent {
    pub const MOVE: &'static str = "move";
    pub const ADD: &'static str = "add";
    pub const SYNCHRONIZE: &'static str = "synchronize";

    pub fn name(&self) -> &'static str {
        match self {
            PeerEvent::Move { .. } => Self::MOVE,
            PeerEvent::Add { .. } => Self::ADD,
            PeerEvent::Synchronize(_) => Self::SYNCHRONIZE,
        }
    }

    pub fn payload(&self) -> Result<String, SyncError> {
        match self {
            PeerEvent::Move { game_id, mv } => {
                let mut payload = format!("{},{},{}", game_id, mv.from, mv.to);
                if let Some(role) = mv.promotion {
                    payload.push(',');
                    payload.push(role.char());
                }
                Ok(payload)
            }
            PeerEvent::Add { pgn } => Ok(pgn.clone()),
            PeerEvent::Synchronize(games) => Ok(serde_json::to_string(games)?),
        }
    }

    pub fn decode(name: &str, payload: &str) -> Result<Self, SyncError> {
        match name {
            Self::MOVE => decode_move(payload),
            Self::ADD => Ok(PeerEvent::Add {
                pgn: payload.to_string(),
            }),
            Self::SYNCHRONIZE => Ok(PeerEvent::Synchronize(serde_json::from_str(payload)?)),
            other => Err(SyncError::Payload(format!("unknown event '{}'", other))),
        }
    }
}

fn decode_move(payload: &str) -> Result<PeerEvent, SyncError> {
    let bad = || SyncError::Payload(format!("malformed move payload '{}'", payload));

    let fields: Vec<&str> = payload.split(',').map(str::trim).collect();
    let (id, from, to, promotion) = match fields.as_slice() {
        [id, from, to] => (id, from, to, None),
        [id, from, to, promotion] => (id, from, to, Some(promotion)),
        _ => return Err(bad()),
    };

    let game_id: GameId = id.parse().map_err(|_| bad())?;
    let from: Square = from.parse().map_err(|_| bad())?;
    let to: Square = to.parse().map_err(|_| bad())?;
    let mut mv = HalfMove::new(from, to);
    if let Some(promotion) = promotion {
        let mut chars = promotion.chars();
        let role = match (chars.next(), chars.next()) {
            (Some(c), None) => Role::from_char(c.to_ascii_lowercase()).ok_or_else(bad)?,
            _ => return Err(bad()),
        };
        if matches!(role, Role::Pawn | Role::King) {
            return Err(bad());
        }
        mv = mv.with_promotion(role);
    }

    Ok(PeerEvent::Move { game_id, mv })
}
