//! Move-quality verdicts from three engine scores.
//!
//! Scores stay exactly as the engine reported them, relative to the side to
//! move in the analysed position:
//!
//! - `actual` and `best` come from the position before the move, with the
//!   mover to move (`actual` from a search restricted to the played move).
//! - `before` is the played-move score of the previous ply, so it is seen from
//!   the opponent's side and is flipped before comparison.
//!
//! The checks run in a fixed order and the first match wins: best move,
//! blunder, centipawn improvement/degrade, mate cases, raw difference.

use chess_game::Color;
use std::fmt;
use uci::{Score, ScoreKind};

/// Scores within this many centipawns of the best move count as equal.
pub const SCORE_EPSILON: i32 = 3;

const MATE_UTILITY: i32 = 100_000;

/// Classification of a played move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveClass {
    /// Matched or beat the engine's best move.
    Best,
    /// The mover's position got worse than before the move.
    Blunder,
    Improvement,
    Degrade,
    /// A forced mate was available and not played.
    MissedMate,
    /// The move left a forced-mate line.
    LostMate,
    /// Mixed units; only the raw difference to the best move is known.
    Other,
}

/// The outcome of [`diff_scores`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub class: MoveClass,
    /// Signed difference backing the classification (0 for `Best`).
    pub delta: i32,
    pub actual: Score,
    pub before: Score,
    pub best: Score,
    pub mover: Color,
}

impl Verdict {
    pub fn classification(&self) -> MoveClass {
        self.class
    }

    /// Moves that should spawn a branch for the player to retry.
    pub fn is_blunder(&self) -> bool {
        matches!(self.class, MoveClass::Blunder | MoveClass::MissedMate)
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            MoveClass::Best => write!(f, "You made the best move!"),
            MoveClass::Blunder => write!(f, "You blundered by this much: {}", self.delta),
            MoveClass::Improvement | MoveClass::Degrade => write!(
                f,
                "Your best move had a score of {}. You chose a move with a score of {} \
                 which is {} of {} from previous: {}",
                self.best.value,
                self.actual.value,
                if self.class == MoveClass::Improvement {
                    "an improvement"
                } else {
                    "a degrade"
                },
                self.delta.unsigned_abs(),
                self.before.value
            ),
            MoveClass::MissedMate => write!(f, "You just blundered mate in {}", self.best.value),
            MoveClass::LostMate => write!(
                f,
                "You lost a forced mate sequence. Score is now: {}",
                self.best
            ),
            MoveClass::Other => write!(f, "{}", Score::new(self.best.kind, self.delta)),
        }
    }
}

/// Orders mates above every centipawn score; shorter mates rank higher for
/// the winner and lower for the loser.
fn utility(score: Score) -> i32 {
    match score.kind {
        ScoreKind::Mate if score.value > 0 => MATE_UTILITY - score.value.min(MATE_UTILITY / 4),
        ScoreKind::Mate => -MATE_UTILITY - score.value.max(-MATE_UTILITY / 4),
        _ => score.value.clamp(-MATE_UTILITY / 2, MATE_UTILITY / 2),
    }
}

/// Positive when `a` is better for its side than `b`.
///
/// Centipawn-unit scores subtract directly. Anything involving a mate only
/// yields a direction, except mate against mate which yields the difference
/// in moves.
fn compare(a: Score, b: Score) -> i32 {
    match (a.is_mate(), b.is_mate()) {
        (false, false) => a.value.saturating_sub(b.value),
        (true, true) => utility(a) - utility(b),
        _ => (utility(a) - utility(b)).signum(),
    }
}

fn is_equal(a: Score, b: Score) -> bool {
    if a.is_mate() || b.is_mate() {
        a == b
    } else {
        a.value.abs_diff(b.value) <= SCORE_EPSILON.unsigned_abs()
    }
}

/// Judges the played move.
///
/// `mover` is the side that played the move; it decides which direction of a
/// centipawn change counts as an improvement.
pub fn diff_scores(actual: Score, before: Score, best: Score, mover: Color) -> Verdict {
    let verdict = |class, delta| Verdict {
        class,
        delta,
        actual,
        before,
        best,
        mover,
    };

    let from_best = compare(actual, best);
    if is_equal(actual, best) || from_best > 0 {
        return verdict(MoveClass::Best, 0);
    }

    let from_before = compare(actual, before.flipped());
    if from_before < 0 {
        return verdict(MoveClass::Blunder, from_before);
    }

    let all_centipawns = [actual, before, best]
        .iter()
        .all(|s| s.kind == ScoreKind::Centipawns);
    if all_centipawns {
        // Both raw values are read on one scale where higher favours White.
        let diff = actual.value.saturating_sub(before.value);
        let improved = match mover {
            Color::White => actual.value > before.value,
            Color::Black => actual.value < before.value,
        };
        let class = if improved {
            MoveClass::Improvement
        } else {
            MoveClass::Degrade
        };
        return verdict(class, diff);
    }

    if best.is_mate() {
        return verdict(MoveClass::MissedMate, from_best);
    }
    if actual.is_mate() {
        return verdict(MoveClass::LostMate, from_best);
    }

    verdict(MoveClass::Other, actual.value.saturating_sub(best.value))
}
