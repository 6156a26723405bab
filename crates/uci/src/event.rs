//! Engine output lines parsed into structured events.
//!
//! The grammar is token based:
//!
//! ```text
//! line     := "uciok" | "readyok" | "id" "name" rest
//!           | "bestmove" (move | "(none)") ["ponder" move]
//!           | "info" field*
//! field    := "depth" int | "nps" int | "score" ("cp" | "mate") int bound?
//!           | "pv" move* | "string" rest | keyword value | token
//! bound    := "upperbound" | "lowerbound"
//! ```
//!
//! A single `info` line may carry both search progress and a score, so parsing
//! yields zero or more events.

use crate::{Score, ScoreKind};

/// Result of a finished search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestMove {
    /// Best move in UCI notation, `None` when the engine reports `(none)`.
    pub mv: Option<String>,
    pub ponder: Option<String>,
}

/// Search progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchInfo {
    pub depth: Option<u32>,
    pub nodes_per_second: Option<u64>,
}

/// Score with the line the engine expects to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreInfo {
    pub score: Score,
    pub principal_line: Vec<String>,
}

/// Messages received from an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine identification (`id name ...`).
    Id(String),
    /// `uciok`
    UciAck,
    /// `readyok`
    ReadyAck,
    BestMove(BestMove),
    SearchInfo(SearchInfo),
    ScoreInfo(ScoreInfo),
}

impl EngineEvent {
    /// Parse one engine output line. Unrecognized or malformed lines yield no events.
    pub fn parse_line(line: &str) -> Vec<EngineEvent> {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("uciok") => vec![EngineEvent::UciAck],
            Some("readyok") => vec![EngineEvent::ReadyAck],
            Some("id") => match tokens.next() {
                Some("name") => {
                    let name = tokens.collect::<Vec<_>>().join(" ");
                    vec![EngineEvent::Id(name)]
                }
                _ => Vec::new(),
            },
            Some("bestmove") => parse_bestmove(tokens).into_iter().collect(),
            Some("info") => parse_info(tokens),
            _ => Vec::new(),
        }
    }
}

/// Returns true for tokens of the form `e2e4` or `e7e8q`.
pub fn is_move_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    let square = |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);
    match bytes.len() {
        4 => square(bytes[0], bytes[1]) && square(bytes[2], bytes[3]),
        5 => {
            square(bytes[0], bytes[1])
                && square(bytes[2], bytes[3])
                && matches!(bytes[4], b'q' | b'r' | b'b' | b'n')
        }
        _ => false,
    }
}

fn parse_bestmove<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Option<EngineEvent> {
    let mv = match tokens.next()? {
        "(none)" | "0000" => None,
        token if is_move_token(token) => Some(token.to_string()),
        _ => return None,
    };

    let ponder = match (tokens.next(), tokens.next()) {
        (Some("ponder"), Some(p)) if is_move_token(p) => Some(p.to_string()),
        _ => None,
    };

    Some(EngineEvent::BestMove(BestMove { mv, ponder }))
}

/// Keywords whose single argument must be skipped so that it is not mistaken
/// for a keyword or a move.
fn takes_one_argument(token: &str) -> bool {
    matches!(
        token,
        "seldepth"
            | "time"
            | "nodes"
            | "multipv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "tbhits"
            | "sbhits"
            | "cpuload"
            | "wdl"
    )
}

fn is_info_keyword(token: &str) -> bool {
    matches!(token, "depth" | "nps" | "score" | "pv" | "string" | "refutation" | "currline")
        || takes_one_argument(token)
}

fn parse_info<'a>(tokens: impl Iterator<Item = &'a str>) -> Vec<EngineEvent> {
    let parts: Vec<&str> = tokens.collect();
    let mut search = SearchInfo::default();
    let mut score: Option<Score> = None;
    let mut principal_line = Vec::new();

    let mut i = 0;
    while i < parts.len() {
        match parts[i] {
            "depth" => {
                i += 1;
                search.depth = parts.get(i).and_then(|s| s.parse().ok());
            }
            "nps" => {
                i += 1;
                search.nodes_per_second = parts.get(i).and_then(|s| s.parse().ok());
            }
            "score" => {
                let kind = match parts.get(i + 1) {
                    Some(&"cp") => Some(ScoreKind::Centipawns),
                    Some(&"mate") => Some(ScoreKind::Mate),
                    _ => None,
                };
                let value = parts.get(i + 2).and_then(|s| s.parse::<i32>().ok());
                if let (Some(kind), Some(value)) = (kind, value) {
                    score = Some(Score::new(kind, value));
                    i += 2;
                }
            }
            "upperbound" | "lowerbound" => {
                // Bounds only change the kind of a centipawn score.
                if let Some(s) = score.as_mut() {
                    if s.kind == ScoreKind::Centipawns {
                        s.kind = if parts[i] == "upperbound" {
                            ScoreKind::Upperbound
                        } else {
                            ScoreKind::Lowerbound
                        };
                    }
                }
            }
            "pv" => {
                i += 1;
                while i < parts.len() && !is_info_keyword(parts[i]) {
                    if is_move_token(parts[i]) {
                        principal_line.push(parts[i].to_string());
                    }
                    i += 1;
                }
                continue;
            }
            "string" => break,
            token if takes_one_argument(token) => {
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    let mut events = Vec::new();
    if search.depth.is_some() || search.nodes_per_second.is_some() {
        events.push(EngineEvent::SearchInfo(search));
    }
    if let Some(score) = score {
        events.push(EngineEvent::ScoreInfo(ScoreInfo {
            score,
            principal_line,
        }));
    }
    events
}
