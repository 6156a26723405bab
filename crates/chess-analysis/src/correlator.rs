//! Best-move requests against an engine that never says which request an
//! answer belongs to.
//!
//! UCI responses carry no request id, so attribution rests on two rules:
//!
//! 1. At most one search is outstanding. [`Correlator::analyze`] holds an
//!    async gate for the whole request; later callers queue behind it.
//! 2. A request is answered by the first `bestmove` after it was issued,
//!    detected by the session's completion counter moving past the value
//!    recorded just before `go` was sent.
//!
//! A cancelled search still ends with one `bestmove`. The request that owns it
//! consumes it and reports `interrupted`, so the next request starts clean. If
//! a caller drops an `analyze` future mid-search, the orphaned `bestmove` is
//! drained by the next request before it sends anything.

use crate::session::{EngineSession, SessionError, SessionSnapshot, SessionState};
use chess_game::HalfMove;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use uci::{GoOptions, GuiCommand, Score, SearchInfo};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// The engine produced no `bestmove` in time. The session is now failed.
    #[error("Engine did not finish the search within {0:?}")]
    Timeout(Duration),
    #[error("Engine session has failed; no further analysis is possible")]
    SessionFailed,
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Search limits and patience for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisLimits {
    /// Passed to the engine as `go movetime`.
    pub movetime: Duration,
    /// How long to wait for `bestmove` before declaring the engine hung.
    pub timeout: Duration,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Self {
            movetime: Duration::from_millis(2000),
            timeout: Duration::from_secs(30),
        }
    }
}

/// One analysis job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    /// Moves from the starting position, in UCI notation.
    pub history: Vec<String>,
    /// Evaluate only this root move.
    pub restrict_to: Option<String>,
    pub movetime: Duration,
}

impl EngineRequest {
    fn commands(&self) -> [GuiCommand; 2] {
        let mut go = GoOptions::movetime(self.movetime.as_millis() as u64);
        if let Some(mv) = &self.restrict_to {
            go = go.restrict_to(mv.clone());
        }
        [
            GuiCommand::Position {
                moves: self.history.clone(),
            },
            GuiCommand::Go(go),
        ]
    }
}

/// What the engine concluded about a request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisResult {
    /// `None` when the position has no legal moves.
    pub best_move: Option<HalfMove>,
    pub score: Option<Score>,
    pub principal_line: Vec<String>,
    pub search: SearchInfo,
    /// The search was cut short by [`Correlator::cancel`].
    pub interrupted: bool,
}

impl AnalysisResult {
    fn from_snapshot(snapshot: &SessionSnapshot, interrupted: bool) -> Self {
        let best_move = snapshot
            .best_move
            .as_ref()
            .and_then(|b| b.mv.as_deref())
            .and_then(|mv| mv.parse().ok());
        let (score, principal_line) = match &snapshot.score {
            Some(info) => (Some(info.score), info.principal_line.clone()),
            None => (None, Vec::new()),
        };
        Self {
            best_move,
            score,
            principal_line,
            search: snapshot.search,
            interrupted,
        }
    }
}

/// Serializes analysis requests onto one [`EngineSession`].
pub struct Correlator {
    session: Arc<EngineSession>,
    /// Held for the duration of a request. Holds the completion count of a
    /// request whose caller went away before its `bestmove` arrived.
    gate: Mutex<Option<u64>>,
    cancelled: AtomicBool,
    limits: AnalysisLimits,
}

impl Correlator {
    pub fn new(session: Arc<EngineSession>, limits: AnalysisLimits) -> Self {
        Self {
            session,
            gate: Mutex::new(None),
            cancelled: AtomicBool::new(false),
            limits,
        }
    }

    pub fn session(&self) -> &Arc<EngineSession> {
        &self.session
    }

    pub fn limits(&self) -> AnalysisLimits {
        self.limits
    }

    /// Returns true while a request holds the engine.
    pub fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err() || self.session.state() == SessionState::Analyzing
    }

    /// Finds the best move after `history`, or scores `restrict_to` alone.
    ///
    /// Waits for any request already in flight. A timeout fails the session
    /// for good.
    pub async fn analyze(
        &self,
        history: &[String],
        restrict_to: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.run(EngineRequest {
            history: history.to_vec(),
            restrict_to: restrict_to.map(str::to_string),
            movetime: self.limits.movetime,
        })
        .await
    }

    pub async fn run(&self, request: EngineRequest) -> Result<AnalysisResult, AnalysisError> {
        let mut orphan = self.gate.lock().await;
        self.ensure_alive()?;

        if let Some(start) = orphan.take() {
            tracing::debug!("draining search abandoned by a previous caller");
            self.session.send(&GuiCommand::Stop)?;
            self.await_completion(start).await?;
        }

        self.cancelled.store(false, Ordering::SeqCst);
        let start = self.session.begin_search();
        *orphan = Some(start);

        for command in request.commands() {
            if let Err(e) = self.session.send(&command) {
                self.session.fail();
                return Err(e.into());
            }
        }

        let snapshot = self.await_completion(start).await?;
        *orphan = None;

        let interrupted = self.cancelled.swap(false, Ordering::SeqCst);
        let result = AnalysisResult::from_snapshot(&snapshot, interrupted);
        tracing::debug!(
            "analysis done: best {:?} score {:?}{}",
            result.best_move.map(|m| m.to_string()),
            result.score,
            if interrupted { " (interrupted)" } else { "" }
        );
        Ok(result)
    }

    /// Asks the engine to cut the current search short.
    ///
    /// The search still ends with a `bestmove`, which the request in flight
    /// consumes. Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        if self.session.state() != SessionState::Analyzing {
            return false;
        }
        self.cancelled.store(true, Ordering::SeqCst);
        if let Err(e) = self.session.send(&GuiCommand::Stop) {
            tracing::warn!("Failed to send stop: {}", e);
        }
        true
    }

    fn ensure_alive(&self) -> Result<(), AnalysisError> {
        match self.session.state() {
            SessionState::Failed => Err(AnalysisError::SessionFailed),
            _ => Ok(()),
        }
    }

    async fn await_completion(&self, start: u64) -> Result<SessionSnapshot, AnalysisError> {
        let timeout = self.limits.timeout;
        let snapshot = self
            .session
            .wait_for(timeout, |s| {
                s.completions > start || s.state == SessionState::Failed
            })
            .await;

        match snapshot {
            Some(s) if s.state == SessionState::Failed => Err(AnalysisError::SessionFailed),
            Some(s) => Ok(s),
            None => {
                tracing::error!("Engine gave no bestmove within {:?}; giving up on it", timeout);
                self.session.fail();
                Err(AnalysisError::Timeout(timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_renders_position_then_go() {
        let request = EngineRequest {
            history: vec!["e2e4".into(), "e7e5".into()],
            restrict_to: Some("g1f3".into()),
            movetime: Duration::from_millis(150),
        };
        let [position, go] = request.commands();
        assert_eq!(position.to_uci(), "position startpos moves e2e4 e7e5");
        assert_eq!(go.to_uci(), "go movetime 150 searchmoves g1f3");
    }

    #[test]
    fn result_from_snapshot() {
        let snapshot = SessionSnapshot {
            best_move: Some(uci::BestMove {
                mv: Some("e7e8q".into()),
                ponder: None,
            }),
            score: Some(uci::ScoreInfo {
                score: Score::mate(1),
                principal_line: vec!["e7e8q".into()],
            }),
            ..SessionSnapshot::default()
        };

        let result = AnalysisResult::from_snapshot(&snapshot, false);
        assert_eq!(result.best_move.unwrap().to_string(), "e7e8q");
        assert_eq!(result.score, Some(Score::mate(1)));
        assert_eq!(result.principal_line, vec!["e7e8q".to_string()]);
    }

    #[test]
    fn no_move_available() {
        let snapshot = SessionSnapshot {
            best_move: Some(uci::BestMove {
                mv: None,
                ponder: None,
            }),
            ..SessionSnapshot::default()
        };
        let result = AnalysisResult::from_snapshot(&snapshot, false);
        assert_eq!(result.best_move, None);
        assert_eq!(result.score, None);
    }
}
