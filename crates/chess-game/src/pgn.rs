//! PGN reading and writing.
//!
//! Reading goes through `pgn-reader`, so tag layout, comments, NAGs, move
//! numbers and result tokens follow the usual export-format rules. Only the
//! main line is kept; variations are skipped. Only games from the standard
//! starting position are supported, and only the first game in the text is
//! read.
//!
//! Writing emits the stored tag pairs, SAN movetext on a single line and the
//! result token once the game is decided.

use crate::{PgnError, Position};
use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use std::fmt::Write as _;
use std::ops::ControlFlow;

const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Builds a [`Position`] from the first game of a PGN stream.
struct Import;

impl Visitor for Import {
    type Tags = Position;
    type Movetext = Position;
    type Output = Result<Position, PgnError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Position> {
        ControlFlow::Continue(Position::new())
    }

    fn tag(
        &mut self,
        position: &mut Position,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        position.tags.push((
            String::from_utf8_lossy(name).into_owned(),
            value.decode_utf8_lossy().into_owned(),
        ));
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, position: Position) -> ControlFlow<Self::Output, Position> {
        if position.tag("SetUp") == Some("1") {
            if let Some(fen) = position.tag("FEN") {
                if fen != STANDARD_START_FEN {
                    return ControlFlow::Break(Err(PgnError::CustomStart(fen.to_string())));
                }
            }
        }
        ControlFlow::Continue(position)
    }

    fn begin_variation(&mut self, _position: &mut Position) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn san(&mut self, position: &mut Position, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        let ply = position.ply_count() + 1;
        match position.play_parsed_san(san_plus.san) {
            Ok(_) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(Err(PgnError::IllegalMove {
                ply,
                san: san_plus.to_string(),
            })),
        }
    }

    fn end_game(&mut self, position: Position) -> Self::Output {
        Ok(position)
    }
}

impl Position {
    /// Parses a PGN game. Text without a game yields an empty one.
    pub fn from_pgn(text: &str) -> Result<Self, PgnError> {
        let mut reader = Reader::new(text.as_bytes());
        let imported = reader
            .read_game(&mut Import)
            .map_err(|e| PgnError::Unreadable(e.to_string()))?;

        match imported {
            Some(Ok(position)) => Ok(position),
            Some(Err(e)) => {
                tracing::warn!("Rejected PGN: {}", e);
                Err(e)
            }
            None => Ok(Position::new()),
        }
    }

    /// Replaces this game with the one described by `text`.
    ///
    /// The game is left untouched when `text` does not parse.
    pub fn load_pgn(&mut self, text: &str) -> Result<(), PgnError> {
        *self = Position::from_pgn(text)?;
        Ok(())
    }

    /// Serializes the game to PGN.
    pub fn to_pgn(&self) -> String {
        let outcome = self.outcome();
        let mut pgn = String::new();

        for (name, value) in self.tags() {
            let value = if name == "Result" && outcome.is_over() {
                outcome.result_token()
            } else {
                value.as_str()
            };
            let _ = writeln!(pgn, "[{} \"{}\"]", name, escape(value));
        }
        if !self.tags().is_empty() {
            pgn.push('\n');
        }

        let mut movetext: Vec<String> = Vec::new();
        for (i, played) in self.history().iter().enumerate() {
            if i % 2 == 0 {
                movetext.push(format!("{}. {}", i / 2 + 1, played.san));
            } else {
                movetext.push(played.san.clone());
            }
        }
        if outcome.is_over() {
            movetext.push(outcome.result_token().to_string());
        } else if let Some(result) = self.tag("Result") {
            movetext.push(result.to_string());
        }

        pgn.push_str(&movetext.join(" "));
        pgn
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameOutcome;

    #[test]
    fn test_write_moves_only() {
        let mut position = Position::new();
        for m in ["e2e4", "e7e5", "g1f3"] {
            position.play(m.parse().unwrap()).unwrap();
        }
        assert_eq!(position.to_pgn(), "1. e4 e5 2. Nf3");
        assert_eq!(Position::new().to_pgn(), "");
    }

    #[test]
    fn test_write_finished_game() {
        let mut position = Position::new();
        for m in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            position.play(m.parse().unwrap()).unwrap();
        }
        assert_eq!(position.to_pgn(), "1. f3 e5 2. g4 Qh4# 0-1");
    }

    #[test]
    fn test_parse_with_headers() {
        let pgn = r#"[Event "Casual"]
[White "Player1"]
[Black "Player2"]
[Result "1-0"]

1. e4 e5 2. Bc4 Nc6 3. Qh5 Nf6 4. Qxf7# 1-0"#;

        let position = Position::from_pgn(pgn).unwrap();
        assert_eq!(position.ply_count(), 7);
        assert_eq!(position.outcome(), GameOutcome::WhiteWin);
        assert_eq!(position.tag("White"), Some("Player1"));
        assert_eq!(position.to_pgn(), pgn);
    }

    #[test]
    fn test_parse_skips_annotations() {
        let pgn = "1.e4 {best by test} e5 $1 2. Nf3!? (2. f4 exf4 (2... d5)) ; gambit\n\
                   2... Nc6 3. Bb5?! a6 *";
        let position = Position::from_pgn(pgn).unwrap();
        assert_eq!(
            position.uci_moves(),
            vec!["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "a7a6"]
        );
    }

    #[test]
    fn test_parse_castling_with_zeros() {
        let pgn = "1. e4 e5 2. Nf3 Nc6 3. Bc4 Nf6 4. 0-0";
        let position = Position::from_pgn(pgn).unwrap();
        assert_eq!(position.last_move().unwrap().san, "O-O");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Position::from_pgn("1. e4 e4"),
            Err(PgnError::IllegalMove { ply: 2, .. })
        ));
        match Position::from_pgn("1. e5") {
            Err(PgnError::IllegalMove { ply, san }) => {
                assert_eq!(ply, 1);
                assert_eq!(san, "e5");
            }
            other => panic!("expected an illegal move, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_tags_sharing_a_line() {
        let position = Position::from_pgn("[Event \"Casual\"] [Site \"?\"]\n\n1. e4 e5").unwrap();
        assert_eq!(position.tag("Event"), Some("Casual"));
        assert_eq!(position.tag("Site"), Some("?"));
        assert_eq!(position.uci_moves(), vec!["e2e4", "e7e5"]);
    }

    #[test]
    fn test_parse_without_moves() {
        assert_eq!(Position::from_pgn("").unwrap(), Position::new());
        assert_eq!(Position::from_pgn("  \n").unwrap(), Position::new());

        let tagged = Position::from_pgn("[White \"Anna\"]\n\n*").unwrap();
        assert_eq!(tagged.ply_count(), 0);
        assert_eq!(tagged.tag("White"), Some("Anna"));
    }

    #[test]
    fn test_custom_start_rejected() {
        let pgn = "[SetUp \"1\"]\n[FEN \"8/8/8/8/8/8/8/K6k w - - 0 1\"]\n\n1. Kb1";
        assert!(matches!(
            Position::from_pgn(pgn),
            Err(PgnError::CustomStart(_))
        ));
    }

    #[test]
    fn test_tag_escapes_roundtrip() {
        let mut position = Position::new();
        position.set_tag("Annotator", r#"The "Doctor" \ co"#);
        let parsed = Position::from_pgn(&position.to_pgn()).unwrap();
        assert_eq!(parsed.tag("Annotator"), Some(r#"The "Doctor" \ co"#));
    }

    #[test]
    fn test_load_pgn_keeps_game_on_error() {
        let mut position = Position::from_pgn("1. d4 d5").unwrap();
        assert!(position.load_pgn("1. d4 d4").is_err());
        assert_eq!(position.uci_moves(), vec!["d2d4", "d7d5"]);

        position.load_pgn("1. c4").unwrap();
        assert_eq!(position.uci_moves(), vec!["c2c4"]);
    }
}
