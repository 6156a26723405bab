//! UCI commands sent from the GUI to the engine.

use crate::UciError;

/// Commands sent from GUI to engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GuiCommand {
    /// Initialize UCI mode.
    Uci,
    /// Tell the engine the next position belongs to a new game.
    UciNewGame,
    /// Check if engine is ready.
    IsReady,
    /// Set up the position reached from the standard start by `moves`.
    Position { moves: Vec<String> },
    /// Start calculating.
    Go(GoOptions),
    /// Stop calculating.
    Stop,
    /// Quit the engine.
    Quit,
    /// Unknown command (for forward compatibility).
    Unknown(String),
}

/// Options for the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoOptions {
    /// Search for exactly this time in milliseconds.
    pub movetime: Option<u64>,
    /// Only consider these root moves.
    pub searchmoves: Vec<String>,
}

impl GoOptions {
    pub fn movetime(ms: u64) -> Self {
        Self {
            movetime: Some(ms),
            ..Self::default()
        }
    }

    /// Restrict the search to a single root move.
    pub fn restrict_to(mut self, mv: impl Into<String>) -> Self {
        self.searchmoves = vec![mv.into()];
        self
    }
}

impl GuiCommand {
    /// Format the command as a single protocol line.
    pub fn to_uci(&self) -> String {
        match self {
            GuiCommand::Uci => "uci".to_string(),
            GuiCommand::UciNewGame => "ucinewgame".to_string(),
            GuiCommand::IsReady => "isready".to_string(),
            GuiCommand::Position { moves } => {
                let mut line = "position startpos".to_string();
                if !moves.is_empty() {
                    line.push_str(" moves ");
                    line.push_str(&moves.join(" "));
                }
                line
            }
            GuiCommand::Go(opts) => {
                let mut parts = vec!["go".to_string()];
                if let Some(ms) = opts.movetime {
                    parts.push(format!("movetime {}", ms));
                }
                // searchmoves consumes the rest of the line, so it goes last.
                if !opts.searchmoves.is_empty() {
                    parts.push(format!("searchmoves {}", opts.searchmoves.join(" ")));
                }
                parts.join(" ")
            }
            GuiCommand::Stop => "stop".to_string(),
            GuiCommand::Quit => "quit".to_string(),
            GuiCommand::Unknown(s) => s.clone(),
        }
    }

    /// Parse a UCI command string.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let mut parts = input.split_whitespace();

        let cmd = parts.next().unwrap_or("");

        match cmd {
            "uci" => Ok(GuiCommand::Uci),
            "ucinewgame" => Ok(GuiCommand::UciNewGame),
            "isready" => Ok(GuiCommand::IsReady),
            "stop" => Ok(GuiCommand::Stop),
            "quit" => Ok(GuiCommand::Quit),
            "position" => Self::parse_position(parts),
            "go" => Self::parse_go(parts),
            "" => Err(UciError::InvalidCommand(String::new())),
            _ => Ok(GuiCommand::Unknown(input.to_string())),
        }
    }

    fn parse_position<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        match parts.next() {
            Some("startpos") => {}
            Some(other) => {
                return Err(UciError::ParseError(format!(
                    "Expected 'startpos', got '{}'",
                    other
                )));
            }
            None => return Err(UciError::ParseError("Expected 'startpos'".to_string())),
        }

        let moves = match parts.next() {
            Some("moves") => parts.map(|s| s.to_string()).collect(),
            Some(other) => {
                return Err(UciError::ParseError(format!(
                    "Expected 'moves', got '{}'",
                    other
                )))
            }
            None => Vec::new(),
        };

        Ok(GuiCommand::Position { moves })
    }

    fn parse_go<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let mut opts = GoOptions::default();
        let parts: Vec<&str> = parts.collect();
        let mut i = 0;

        while i < parts.len() {
            match parts[i] {
                "movetime" => {
                    i += 1;
                    opts.movetime = parts.get(i).and_then(|s| s.parse().ok());
                }
                "searchmoves" => {
                    opts.searchmoves = parts[i + 1..].iter().map(|s| s.to_string()).collect();
                    break;
                }
                _ => {}
            }
            i += 1;
        }

        Ok(GuiCommand::Go(opts))
    }
}
