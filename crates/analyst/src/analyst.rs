//! Plays moves into shared games, asks the engine about them and keeps peers
//! informed.
//!
//! For every submitted move the engine is asked twice about the position the
//! move was played from: once for its own best move, once restricted to the
//! played move. The two scores plus the previous ply's restricted score go to
//! [`diff_scores`].

use crate::AnalystError;
use chess_analysis::{diff_scores, AnalysisResult, Correlator, Verdict};
use chess_game::{Color, HalfMove, PlayedMove, Position, Role, DEFAULT_PROMOTION};
use game_sync::{GameId, GameRegistry, PeerEvent, RoomMember, RoomPublisher, SyncError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uci::Score;

/// Behaviour switches for [`Analyst`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaySettings {
    /// Fork a new game from the position before a blunder.
    pub branch_on_blunder: bool,
    /// Surface the opponent's reply when the played move keeps a forced mate.
    pub follow_mate_lines: bool,
    /// Piece a pawn promotes to when the move does not say.
    pub promotion: Role,
}

impl Default for PlaySettings {
    fn default() -> Self {
        Self {
            branch_on_blunder: true,
            follow_mate_lines: false,
            promotion: DEFAULT_PROMOTION,
        }
    }
}

/// Everything learned about one played move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    pub game_id: GameId,
    pub played: PlayedMove,
    /// Unrestricted search of the position before the move.
    pub best: AnalysisResult,
    /// Search restricted to the played move.
    pub actual: AnalysisResult,
    /// `None` when the engine reported no score or a search was cut short.
    pub verdict: Option<Verdict>,
    /// Game forked from the position before a blunder.
    pub branch: Option<GameId>,
    /// The opponent's reply from a forced-mate line.
    pub forced_reply: Option<HalfMove>,
    /// An analysis already running was cancelled for this one.
    pub interrupted: bool,
}

pub struct Analyst {
    registry: Arc<GameRegistry>,
    correlator: Arc<Correlator>,
    peers: Option<RoomPublisher>,
    settings: PlaySettings,
    /// Restricted score of each game's last analysed move, as the engine
    /// reported it for that move's side.
    previous: Mutex<HashMap<GameId, Score>>,
}

impl Analyst {
    pub fn new(
        registry: Arc<GameRegistry>,
        correlator: Arc<Correlator>,
        settings: PlaySettings,
    ) -> Self {
        Self {
            registry,
            correlator,
            peers: None,
            settings,
            previous: Mutex::new(HashMap::new()),
        }
    }

    /// Publishes local changes through `peers`.
    pub fn with_peers(mut self, peers: RoomPublisher) -> Self {
        self.peers = Some(peers);
        self
    }

    pub fn registry(&self) -> &Arc<GameRegistry> {
        &self.registry
    }

    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    pub fn settings(&self) -> PlaySettings {
        self.settings
    }

    fn previous(&self) -> MutexGuard<'_, HashMap<GameId, Score>> {
        self.previous.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: PeerEvent) {
        let Some(peers) = &self.peers else {
            return;
        };
        if let Err(e) = peers.publish(&event) {
            tracing::warn!("Failed to publish {} event: {}", event.name(), e);
        }
    }

    /// Registers an empty game under a fresh id and tells peers about it.
    pub fn new_game(&self) -> GameId {
        let id = self.registry.next_id();
        self.registry.register(id, Position::new());
        self.publish(PeerEvent::Add { pgn: String::new() });
        tracing::info!("Created game {}", id);
        id
    }

    /// Plays `mv` in game `game_id` and analyses it.
    ///
    /// An illegal move leaves the game untouched and is neither published nor
    /// analysed.
    pub async fn submit_move(
        &self,
        game_id: GameId,
        mv: HalfMove,
    ) -> Result<MoveReport, AnalystError> {
        let (before, played) = self.play(game_id, mv)?;
        self.publish(PeerEvent::Move {
            game_id,
            mv: played.half_move,
        });
        self.analyze_played(game_id, before, played).await
    }

    /// Returns the game as it was before the move, and the move.
    fn play(&self, game_id: GameId, mv: HalfMove) -> Result<(Position, PlayedMove), AnalystError> {
        let game = self
            .registry
            .get(game_id)
            .ok_or(SyncError::UnknownGame(game_id))?;
        let mut position = game.write().unwrap_or_else(PoisonError::into_inner);

        let before = position.clone();
        let mv = position.complete(mv, self.settings.promotion);
        match position.play(mv) {
            Ok(played) => Ok((before, played.clone())),
            Err(e) => {
                tracing::warn!("Rejected {} in game {}: {}", mv, game_id, e);
                Err(e.into())
            }
        }
    }

    async fn analyze_played(
        &self,
        game_id: GameId,
        before: Position,
        played: PlayedMove,
    ) -> Result<MoveReport, AnalystError> {
        let interrupted = self.correlator.cancel();
        if interrupted {
            tracing::info!("Interrupted the running analysis for game {}", game_id);
        }

        let history = before.uci_moves();
        let mover = before.side_to_move();
        let played_uci = played.half_move.to_string();

        let best = self.correlator.analyze(&history, None).await?;
        let actual = self.correlator.analyze(&history, Some(&played_uci)).await?;

        let previous = {
            let mut scores = self.previous();
            let previous = scores
                .get(&game_id)
                .copied()
                .unwrap_or(Score::centipawns(0));
            match actual.score {
                Some(score) => scores.insert(game_id, score),
                None => scores.remove(&game_id),
            };
            previous
        };

        let verdict = judge(&best, &actual, previous, mover);
        if verdict.is_none() && (best.interrupted || actual.interrupted) {
            tracing::info!("Game {}: analysis of {} was cut short", game_id, played.san);
        }
        if let Some(verdict) = &verdict {
            tracing::info!(
                "Game {}: {} {} ({:?})",
                game_id,
                side_name(mover),
                played.san,
                verdict.classification()
            );
        }

        let branch = match &verdict {
            Some(verdict) if verdict.is_blunder() && self.settings.branch_on_blunder => {
                Some(self.branch(game_id, before))
            }
            _ => None,
        };

        let forced_reply = if self.settings.follow_mate_lines {
            forced_reply(&actual)
        } else {
            None
        };

        Ok(MoveReport {
            game_id,
            played,
            best,
            actual,
            verdict,
            branch,
            forced_reply,
            interrupted,
        })
    }

    /// Registers a copy of `position` so the blunder can be replayed.
    fn branch(&self, from: GameId, position: Position) -> GameId {
        let pgn = position.to_pgn();
        let id = self.registry.next_id();
        self.registry.register(id, position);
        self.publish(PeerEvent::Add { pgn });
        tracing::info!("Branched game {} from game {} before the blunder", id, from);
        id
    }

    /// Replaces game `game_id` with `pgn`, then analyses its last move.
    ///
    /// The game is created if it does not exist. Peers receive the new
    /// snapshot. Returns `None` for a PGN without moves.
    pub async fn load_pgn(
        &self,
        game_id: GameId,
        pgn: &str,
    ) -> Result<Option<MoveReport>, AnalystError> {
        let loaded = Position::from_pgn(pgn)?;
        let mut before = loaded.clone();
        let last = before.undo().ok();

        match self.registry.get(game_id) {
            Some(game) => *game.write().unwrap_or_else(PoisonError::into_inner) = loaded,
            None => {
                self.registry.register(game_id, loaded);
            }
        }
        self.previous().remove(&game_id);
        tracing::info!("Loaded PGN into game {}", game_id);
        self.announce();

        match last {
            Some(played) => Ok(Some(self.analyze_played(game_id, before, played).await?)),
            None => Ok(None),
        }
    }

    /// Applies an event from a peer. Nothing is analysed or re-published.
    pub fn handle_peer_event(&self, event: &PeerEvent) -> Result<Vec<GameId>, AnalystError> {
        let touched = self.registry.apply_event(event)?;
        let mut previous = self.previous();
        for id in &touched {
            previous.remove(id);
        }
        tracing::debug!("Applied peer {} event to games {:?}", event.name(), touched);
        Ok(touched)
    }

    /// Publishes every local game as a `synchronize` event.
    pub fn announce(&self) {
        self.publish(PeerEvent::Synchronize(self.registry.snapshot()));
    }

    /// Applies peer events as they arrive until the room closes.
    pub async fn listen(self: Arc<Self>, mut member: RoomMember) {
        while let Some(event) = member.recv().await {
            if let Err(e) = self.handle_peer_event(&event) {
                tracing::warn!("Ignoring peer {} event: {}", event.name(), e);
            }
        }
        tracing::debug!("Room closed");
    }
}

/// Judges the played move, unless a search lacks a score or was cut short
/// by a later move.
fn judge(
    best: &AnalysisResult,
    actual: &AnalysisResult,
    previous: Score,
    mover: Color,
) -> Option<Verdict> {
    if best.interrupted || actual.interrupted {
        return None;
    }
    Some(diff_scores(actual.score?, previous, best.score?, mover))
}

/// The opponent's answer in the played move's line, when that line is a
/// forced mate.
fn forced_reply(actual: &AnalysisResult) -> Option<HalfMove> {
    let score = actual.score?;
    if !score.is_mate() {
        return None;
    }
    actual.principal_line.get(1)?.parse().ok()
}

fn side_name(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}
