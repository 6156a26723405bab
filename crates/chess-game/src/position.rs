//! Game state as an ordered move history from the standard starting position.
//!
//! [`Position`] keeps every intermediate board so that undo is a pop and
//! repetition detection is a hash comparison over the history.

use crate::{HalfMove, PositionError};
use shakmaty::san::San;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{Chess, Color, EnPassantMode, Move, Position as _, Role, Square};
use std::collections::BTreeMap;

/// Piece used when a pawn reaches the last rank without an explicit choice.
pub const DEFAULT_PROMOTION: Role = Role::Queen;

/// Half-moves without capture or pawn move after which the game is drawn.
const FIFTY_MOVE_PLIES: u32 = 100;

/// Result of a game as far as the rules can tell from the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameOutcome {
    Ongoing,
    WhiteWin,
    BlackWin,
    Draw,
}

impl GameOutcome {
    pub fn is_over(self) -> bool {
        self != GameOutcome::Ongoing
    }

    /// PGN termination marker.
    pub fn result_token(self) -> &'static str {
        match self {
            GameOutcome::Ongoing => "*",
            GameOutcome::WhiteWin => "1-0",
            GameOutcome::BlackWin => "0-1",
            GameOutcome::Draw => "1/2-1/2",
        }
    }
}

/// Why a game ended in a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawReason {
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
    FiftyMoveRule,
}

/// A move that has been played, with its SAN as it was written at the time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    pub half_move: HalfMove,
    pub san: String,
}

/// A game reconstructed from its move history.
#[derive(Debug, Clone)]
pub struct Position {
    /// Board after each ply; `boards[0]` is the starting position.
    boards: Vec<Chess>,
    hashes: Vec<Zobrist64>,
    moves: Vec<PlayedMove>,
    pub(crate) tags: Vec<(String, String)>,
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.moves == other.moves && self.tags == other.tags
    }
}

impl Position {
    /// The standard starting position with no moves played.
    pub fn new() -> Self {
        let start = Chess::default();
        let hash: Zobrist64 = start.zobrist_hash(EnPassantMode::Legal);
        Self {
            boards: vec![start],
            hashes: vec![hash],
            moves: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Replays `moves` from the starting position.
    pub fn from_moves<I>(moves: I) -> Result<Self, PositionError>
    where
        I: IntoIterator<Item = HalfMove>,
    {
        let mut position = Self::new();
        for mv in moves {
            position.play(mv)?;
        }
        Ok(position)
    }

    fn board(&self) -> &Chess {
        // boards always holds at least the starting position
        &self.boards[self.boards.len() - 1]
    }

    pub fn side_to_move(&self) -> Color {
        self.board().turn()
    }

    /// Number of half-moves played.
    pub fn ply_count(&self) -> usize {
        self.moves.len()
    }

    pub fn history(&self) -> &[PlayedMove] {
        &self.moves
    }

    /// History in UCI notation, ready for `position startpos moves ...`.
    pub fn uci_moves(&self) -> Vec<String> {
        self.moves.iter().map(|m| m.half_move.to_string()).collect()
    }

    pub fn last_move(&self) -> Option<&PlayedMove> {
        self.moves.last()
    }

    pub fn is_check(&self) -> bool {
        self.board().is_check()
    }

    /// Fills in `promotion` for a pawn move onto the last rank that would
    /// otherwise be illegal. Other moves are returned unchanged.
    pub fn complete(&self, mv: HalfMove, promotion: Role) -> HalfMove {
        if mv.promotion.is_none() && self.resolve(mv).is_none() {
            let promoted = mv.with_promotion(promotion);
            if self.resolve(promoted).is_some() {
                return promoted;
            }
        }
        mv
    }

    fn resolve(&self, mv: HalfMove) -> Option<Move> {
        mv.to_uci_move().to_move(self.board()).ok()
    }

    pub fn is_legal(&self, mv: HalfMove) -> bool {
        !self.outcome().is_over() && self.resolve(self.complete(mv, DEFAULT_PROMOTION)).is_some()
    }

    /// Plays a move, promoting to [`DEFAULT_PROMOTION`] when none is given.
    ///
    /// Nothing changes when the move is rejected.
    pub fn play(&mut self, mv: HalfMove) -> Result<&PlayedMove, PositionError> {
        if self.outcome().is_over() {
            return Err(PositionError::GameOver);
        }
        let mv = self.complete(mv, DEFAULT_PROMOTION);
        let legal = self
            .resolve(mv)
            .ok_or_else(|| PositionError::IllegalMove(mv.to_string()))?;
        self.push(legal);
        Ok(&self.moves[self.moves.len() - 1])
    }

    /// Plays a move in SAN (`Nf3`, `exd8=Q+`, `O-O`).
    pub fn play_san(&mut self, san: &str) -> Result<&PlayedMove, PositionError> {
        let text = san.trim_end_matches(['+', '#']).replace('0', "O");
        let parsed: San = text
            .parse()
            .map_err(|_| PositionError::InvalidMove(san.to_string()))?;
        self.play_parsed_san(parsed)
    }

    pub(crate) fn play_parsed_san(&mut self, san: San) -> Result<&PlayedMove, PositionError> {
        if self.outcome().is_over() {
            return Err(PositionError::GameOver);
        }
        let legal = san
            .to_move(self.board())
            .map_err(|_| PositionError::IllegalMove(san.to_string()))?;
        self.push(legal);
        Ok(&self.moves[self.moves.len() - 1])
    }

    fn push(&mut self, legal: Move) {
        let before = self.board().clone();
        let half_move = match HalfMove::from_legal(&legal) {
            Some(half_move) => half_move,
            None => return,
        };
        let mut san = San::from_move(&before, legal.clone()).to_string();

        let mut after = before;
        after.play_unchecked(legal);
        if after.is_checkmate() {
            san.push('#');
        } else if after.is_check() {
            san.push('+');
        }

        self.hashes.push(after.zobrist_hash(EnPassantMode::Legal));
        self.boards.push(after);
        self.moves.push(PlayedMove { half_move, san });
    }

    /// Takes back the last half-move.
    pub fn undo(&mut self) -> Result<PlayedMove, PositionError> {
        let last = self.moves.pop().ok_or(PositionError::NothingToUndo)?;
        self.boards.pop();
        self.hashes.pop();
        Ok(last)
    }

    pub fn legal_moves(&self) -> Vec<HalfMove> {
        if self.outcome().is_over() {
            return Vec::new();
        }
        self.board()
            .legal_moves()
            .iter()
            .filter_map(HalfMove::from_legal)
            .collect()
    }

    /// Map from every square holding a movable piece to its destinations.
    pub fn legal_destinations(&self) -> BTreeMap<Square, Vec<Square>> {
        let mut destinations: BTreeMap<Square, Vec<Square>> = BTreeMap::new();
        for mv in self.legal_moves() {
            let targets = destinations.entry(mv.from).or_default();
            if !targets.contains(&mv.to) {
                targets.push(mv.to);
            }
        }
        for targets in destinations.values_mut() {
            targets.sort();
        }
        destinations
    }

    /// Times the current position has occurred, counting this occurrence.
    pub fn repetitions(&self) -> usize {
        let current = self.hashes[self.hashes.len() - 1];
        self.hashes.iter().filter(|&&h| h == current).count()
    }

    pub fn draw_reason(&self) -> Option<DrawReason> {
        let board = self.board();
        if board.is_stalemate() {
            Some(DrawReason::Stalemate)
        } else if board.is_insufficient_material() {
            Some(DrawReason::InsufficientMaterial)
        } else if self.repetitions() >= 3 {
            Some(DrawReason::ThreefoldRepetition)
        } else if board.halfmoves() >= FIFTY_MOVE_PLIES && !board.is_checkmate() {
            Some(DrawReason::FiftyMoveRule)
        } else {
            None
        }
    }

    /// Checkmate is a loss for the side whose turn it is.
    pub fn outcome(&self) -> GameOutcome {
        let board = self.board();
        if board.is_checkmate() {
            return match board.turn() {
                Color::White => GameOutcome::BlackWin,
                Color::Black => GameOutcome::WhiteWin,
            };
        }
        if self.draw_reason().is_some() {
            GameOutcome::Draw
        } else {
            GameOutcome::Ongoing
        }
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets a tag, keeping its original place when it already exists.
    pub fn set_tag(&mut self, name: &str, value: &str) {
        match self.tags.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.tags.push((name.to_string(), value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(s: &str) -> HalfMove {
        s.parse().unwrap()
    }

    fn play_all(position: &mut Position, moves: &[&str]) {
        for m in moves {
            position.play(mv(m)).unwrap();
        }
    }

    #[test]
    fn new_position() {
        let position = Position::new();
        assert_eq!(position.ply_count(), 0);
        assert_eq!(position.side_to_move(), Color::White);
        assert_eq!(position.outcome(), GameOutcome::Ongoing);
        assert_eq!(position.legal_moves().len(), 20);
    }

    #[test]
    fn play_records_san() {
        let mut position = Position::new();
        assert_eq!(position.play(mv("e2e4")).unwrap().san, "e4");
        assert_eq!(position.play(mv("e7e5")).unwrap().san, "e5");
        assert_eq!(position.play(mv("g1f3")).unwrap().san, "Nf3");
        assert_eq!(position.side_to_move(), Color::Black);
        assert_eq!(position.uci_moves(), vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn illegal_move_leaves_position_unchanged() {
        let mut position = Position::new();
        let err = position.play(mv("e2e5")).unwrap_err();
        assert!(matches!(err, PositionError::IllegalMove(_)));
        assert_eq!(position.ply_count(), 0);
        assert!(!position.is_legal(mv("e7e5")));
    }

    #[test]
    fn castling_uses_king_squares() {
        let mut position = Position::new();
        play_all(&mut position, &["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6"]);
        assert!(position.is_legal(mv("e1g1")));
        assert_eq!(position.play(mv("e1g1")).unwrap().san, "O-O");
        assert_eq!(position.last_move().unwrap().half_move, mv("e1g1"));
    }

    #[test]
    fn promotion_defaults_to_queen() {
        let mut position = Position::new();
        play_all(
            &mut position,
            &["h2h4", "g7g5", "h4g5", "h7h6", "g5h6", "a7a6", "h6h7", "a6a5"],
        );
        let played = position.play(mv("h7g8")).unwrap();
        assert_eq!(played.half_move.promotion, Some(Role::Queen));
        assert_eq!(played.san, "hxg8=Q");
    }

    #[test]
    fn explicit_underpromotion() {
        let mut position = Position::new();
        play_all(
            &mut position,
            &["h2h4", "g7g5", "h4g5", "h7h6", "g5h6", "a7a6", "h6h7", "a6a5"],
        );
        let played = position.play(mv("h7g8n")).unwrap();
        assert_eq!(played.half_move.promotion, Some(Role::Knight));
        assert_eq!(played.san, "hxg8=N");
    }

    #[test]
    fn undo_restores_previous_state() {
        let mut position = Position::new();
        play_all(&mut position, &["d2d4", "d7d5"]);
        let undone = position.undo().unwrap();
        assert_eq!(undone.half_move, mv("d7d5"));
        assert_eq!(position.side_to_move(), Color::Black);
        assert_eq!(position.ply_count(), 1);

        position.undo().unwrap();
        assert!(matches!(position.undo(), Err(PositionError::NothingToUndo)));
    }

    #[test]
    fn checkmate_by_black() {
        let mut position = Position::new();
        play_all(&mut position, &["f2f3", "e7e5", "g2g4", "d8h4"]);
        assert_eq!(position.last_move().unwrap().san, "Qh4#");
        assert_eq!(position.outcome(), GameOutcome::BlackWin);
        assert!(position.legal_moves().is_empty());
        assert!(matches!(
            position.play(mv("a2a3")),
            Err(PositionError::GameOver)
        ));
    }

    #[test]
    fn checkmate_of_black() {
        let mut position = Position::new();
        play_all(&mut position, &["e2e4", "f7f6", "d2d4", "g7g5", "d1h5"]);
        assert_eq!(position.side_to_move(), Color::Black);
        assert_eq!(position.outcome(), GameOutcome::WhiteWin);
    }

    #[test]
    fn threefold_repetition() {
        let mut position = Position::new();
        let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];
        play_all(&mut position, &shuffle);
        assert_eq!(position.repetitions(), 2);
        assert_eq!(position.outcome(), GameOutcome::Ongoing);
        play_all(&mut position, &shuffle);
        assert_eq!(position.repetitions(), 3);
        assert_eq!(
            position.draw_reason(),
            Some(DrawReason::ThreefoldRepetition)
        );
        assert_eq!(position.outcome(), GameOutcome::Draw);
    }

    #[test]
    fn legal_destinations_at_start() {
        let destinations = Position::new().legal_destinations();
        assert_eq!(destinations.len(), 10);
        assert_eq!(destinations[&Square::G1], vec![Square::F3, Square::H3]);
        assert_eq!(destinations[&Square::E2].len(), 2);
    }

    #[test]
    fn play_san_accepts_suffixes() {
        let mut position = Position::new();
        for san in ["e4", "e5", "Bc4", "Nc6", "Qh5", "Nf6", "Qxf7#"] {
            position.play_san(san).unwrap();
        }
        assert_eq!(position.outcome(), GameOutcome::WhiteWin);
        assert!(matches!(
            Position::new().play_san("Nf6"),
            Err(PositionError::IllegalMove(_))
        ));
        assert!(matches!(
            Position::new().play_san("Zz9"),
            Err(PositionError::InvalidMove(_))
        ));
    }

    #[test]
    fn tags_keep_order() {
        let mut position = Position::new();
        position.set_tag("White", "Alice");
        position.set_tag("Black", "Bob");
        position.set_tag("White", "Carol");
        assert_eq!(position.tag("White"), Some("Carol"));
        assert_eq!(position.tags()[0].0, "White");
        assert_eq!(position.tag("Event"), None);
    }
}
