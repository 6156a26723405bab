//! Configuration loading for the analyst.

use chess_analysis::AnalysisLimits;
use chess_game::Role;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE: &str = "analyst.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid default promotion '{0}'; expected one of q, r, b, n")]
    Promotion(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalystConfig {
    pub engine: EngineConfig,
    pub play: PlayConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Program and arguments, split on whitespace.
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_movetime_ms")]
    pub movetime_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayConfig {
    /// Fork a new game from the position before a blunder.
    #[serde(default = "default_true")]
    pub branch_on_blunder: bool,
    /// Play the opponent's reply when the played move keeps a forced mate.
    #[serde(default)]
    pub follow_mate_lines: bool,
    #[serde(default = "default_promotion")]
    pub default_promotion: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_room_capacity")]
    pub room_capacity: usize,
}

fn default_command() -> String {
    "stockfish".to_string()
}

fn default_movetime_ms() -> u64 {
    2000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_promotion() -> String {
    "q".to_string()
}

fn default_room_capacity() -> usize {
    game_sync::DEFAULT_ROOM_CAPACITY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            movetime_ms: default_movetime_ms(),
            timeout_ms: default_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            branch_on_blunder: true,
            follow_mate_lines: false,
            default_promotion: default_promotion(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            room_capacity: default_room_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn limits(&self) -> AnalysisLimits {
        AnalysisLimits {
            movetime: Duration::from_millis(self.movetime_ms),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl PlayConfig {
    pub fn promotion(&self) -> Result<Role, ConfigError> {
        let mut chars = self.default_promotion.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => match Role::from_char(c.to_ascii_lowercase()) {
                Some(role) if !matches!(role, Role::Pawn | Role::King) => Ok(role),
                _ => Err(ConfigError::Promotion(self.default_promotion.clone())),
            },
            _ => Err(ConfigError::Promotion(self.default_promotion.clone())),
        }
    }
}

impl AnalystConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: AnalystConfig = toml::from_str(text)?;
        config.play.promotion()?;
        Ok(config)
    }

    /// Loads `explicit` if given. Otherwise looks for `analyst.toml` in the
    /// current directory and its parents, falling back to defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::read(path).await;
        }

        let paths = ["analyst.toml", "../analyst.toml", "../../analyst.toml"];
        for path in paths {
            let path = Path::new(path);
            if path.exists() {
                return Self::read(path).await;
            }
        }

        tracing::info!("No {} found, using defaults", CONFIG_FILE);
        Ok(Self::default())
    }

    async fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_toml(&content)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AnalystConfig::from_toml("").unwrap();
        assert_eq!(config, AnalystConfig::default());
        assert_eq!(config.engine.command, "stockfish");
        assert_eq!(config.engine.limits(), AnalysisLimits::default());
        assert_eq!(config.engine.handshake_timeout(), Duration::from_secs(10));
        assert!(config.play.branch_on_blunder);
        assert!(!config.play.follow_mate_lines);
        assert_eq!(config.play.promotion().unwrap(), Role::Queen);
        assert_eq!(config.sync.room_capacity, 100);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AnalystConfig::from_toml(
            r#"
            [engine]
            command = "/usr/bin/stockfish -q"
            movetime_ms = 500

            [play]
            follow_mate_lines = true
            default_promotion = "N"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.command, "/usr/bin/stockfish -q");
        assert_eq!(config.engine.limits().movetime, Duration::from_millis(500));
        assert_eq!(config.engine.timeout_ms, 30_000);
        assert!(config.play.branch_on_blunder);
        assert!(config.play.follow_mate_lines);
        assert_eq!(config.play.promotion().unwrap(), Role::Knight);
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    fn rejects_bad_promotion() {
        for bad in ["k", "p", "queen", ""] {
            let text = format!("[play]\ndefault_promotion = \"{}\"", bad);
            assert!(matches!(
                AnalystConfig::from_toml(&text),
                Err(ConfigError::Promotion(_))
            ));
        }
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            AnalystConfig::from_toml("[engine\ncommand = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn missing_explicit_file_is_an_error() {
        let err = AnalystConfig::load(Some(Path::new("/nonexistent/analyst.toml")))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
