//! Engine score values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit and certainty of a reported score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreKind {
    /// Exact evaluation in centipawns.
    Centipawns,
    /// Moves until mate (negative when the side to move is getting mated).
    Mate,
    /// Centipawn score that is only an upper bound (fail-low).
    Upperbound,
    /// Centipawn score that is only a lower bound (fail-high).
    Lowerbound,
}

impl ScoreKind {
    /// Returns true for kinds measured in centipawns.
    pub fn is_centipawn_unit(self) -> bool {
        !matches!(self, ScoreKind::Mate)
    }
}

/// A score as reported by the engine, relative to the side to move in the
/// analysed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub kind: ScoreKind,
    pub value: i32,
}

impl Score {
    pub fn new(kind: ScoreKind, value: i32) -> Self {
        Self { kind, value }
    }

    pub fn centipawns(value: i32) -> Self {
        Self::new(ScoreKind::Centipawns, value)
    }

    pub fn mate(moves: i32) -> Self {
        Self::new(ScoreKind::Mate, moves)
    }

    pub fn is_mate(&self) -> bool {
        self.kind == ScoreKind::Mate
    }

    /// Returns true when both scores can be subtracted without conversion.
    pub fn same_units(&self, other: &Score) -> bool {
        self.kind.is_centipawn_unit() == other.kind.is_centipawn_unit()
    }

    /// The same score seen from the other side of the board.
    ///
    /// Bounds swap as well: an upper bound for one side is a lower bound for
    /// the other.
    pub fn flipped(&self) -> Self {
        let kind = match self.kind {
            ScoreKind::Upperbound => ScoreKind::Lowerbound,
            ScoreKind::Lowerbound => ScoreKind::Upperbound,
            other => other,
        };
        Self::new(kind, self.value.saturating_neg())
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScoreKind::Centipawns => write!(f, "Centipawns: {}", self.value),
            ScoreKind::Upperbound => write!(f, "Upperbound: {}", self.value),
            ScoreKind::Lowerbound => write!(f, "Lowerbound: {}", self.value),
            ScoreKind::Mate => write!(f, "Mate in: {}", self.value),
        }
    }
}
