//! One conversation with a UCI engine.
//!
//! The session owns no I/O of its own: outgoing lines go through a
//! [`Transport`], and whoever reads the engine's output feeds each line to
//! [`EngineSession::handle_line`]. Everything the session learns is published
//! as a [`SessionSnapshot`] on a `watch` channel.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uci::{BestMove, EngineEvent, GuiCommand, ScoreInfo, SearchInfo};

/// Errors from the engine conversation itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Engine transport closed")]
    TransportClosed,
    #[error("Engine did not answer '{0}' within {1:?}")]
    HandshakeTimeout(&'static str, Duration),
    #[error("Engine session has failed")]
    Failed,
}

/// Write side of the line-oriented channel to the engine.
///
/// Writes are fire-and-forget: a transport only reports whether the line could
/// be handed off, never whether the engine acted on it.
pub trait Transport: Send + Sync {
    fn send_line(&self, line: &str) -> Result<(), SessionError>;
}

impl Transport for mpsc::UnboundedSender<String> {
    fn send_line(&self, line: &str) -> Result<(), SessionError> {
        self.send(line.to_string())
            .map_err(|_| SessionError::TransportClosed)
    }
}

/// Lifecycle of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingHandshake,
    Ready,
    Analyzing,
    /// The engine stopped answering. Terminal.
    Failed,
}

/// Everything observers may know about the session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub engine_name: Option<String>,
    /// Advances on every `bestmove` and every scored `info` line.
    pub responses: u64,
    /// Advances on every `bestmove` line.
    pub completions: u64,
    pub best_move: Option<BestMove>,
    pub score: Option<ScoreInfo>,
    pub search: SearchInfo,
    pub uci_ok: bool,
    pub ready: bool,
}

pub struct EngineSession {
    transport: Box<dyn Transport>,
    state_tx: watch::Sender<SessionSnapshot>,
}

impl EngineSession {
    pub fn new(transport: impl Transport + 'static) -> Self {
        let (state_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            transport: Box::new(transport),
            state_tx,
        }
    }

    /// Observe every change to the session.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_tx.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().state
    }

    /// Writes one line to the engine verbatim.
    pub fn send_line(&self, line: &str) -> Result<(), SessionError> {
        tracing::debug!("engine < {}", line);
        self.transport.send_line(line)
    }

    pub fn send(&self, command: &GuiCommand) -> Result<(), SessionError> {
        self.send_line(&command.to_uci())
    }

    /// Runs the `uci` / `ucinewgame` / `isready` handshake.
    pub async fn initialize(&self, timeout: Duration) -> Result<(), SessionError> {
        if self.state() == SessionState::Failed {
            return Err(SessionError::Failed);
        }
        self.state_tx.send_modify(|s| {
            s.state = SessionState::AwaitingHandshake;
            s.uci_ok = false;
            s.ready = false;
        });

        self.send(&GuiCommand::Uci)?;
        if self.wait_for(timeout, |s| s.uci_ok).await.is_none() {
            return Err(self.handshake_timed_out("uci", timeout));
        }

        self.send(&GuiCommand::UciNewGame)?;
        self.send(&GuiCommand::IsReady)?;
        if self.wait_for(timeout, |s| s.ready).await.is_none() {
            return Err(self.handshake_timed_out("isready", timeout));
        }

        let name = self.state_tx.borrow().engine_name.clone();
        tracing::info!(
            "Engine ready: {}",
            name.as_deref().unwrap_or("unknown engine")
        );
        self.set_state(SessionState::Ready);
        Ok(())
    }

    fn handshake_timed_out(&self, step: &'static str, timeout: Duration) -> SessionError {
        tracing::error!("Engine did not answer `{}` within {:?}", step, timeout);
        self.fail();
        SessionError::HandshakeTimeout(step, timeout)
    }

    /// Feeds one line of engine output into the session.
    pub fn handle_line(&self, line: &str) {
        let line = line.trim_end();
        tracing::debug!("engine > {}", line);

        let events = EngineEvent::parse_line(line);
        if events.is_empty() {
            return;
        }
        self.state_tx.send_modify(|s| {
            for event in events {
                apply(s, event);
            }
        });
    }

    /// Asks the engine to exit.
    pub fn shutdown(&self) {
        if self.state() != SessionState::Failed {
            self.set_state(SessionState::Idle);
        }
        if let Err(e) = self.send(&GuiCommand::Quit) {
            tracing::debug!("quit not delivered: {}", e);
        }
    }

    /// Marks the session as permanently broken.
    pub fn fail(&self) {
        self.set_state(SessionState::Failed);
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state_tx.send_if_modified(|s| {
            if s.state == state {
                return false;
            }
            tracing::debug!("session {:?} -> {:?}", s.state, state);
            s.state = state;
            true
        });
    }

    /// Enters `Analyzing`, forgets the previous search and returns the
    /// completion count the new search has to exceed.
    pub(crate) fn begin_search(&self) -> u64 {
        let mut completions = 0;
        self.state_tx.send_modify(|s| {
            s.state = SessionState::Analyzing;
            s.best_move = None;
            s.score = None;
            s.search = SearchInfo::default();
            completions = s.completions;
        });
        completions
    }

    /// Waits until `done` holds for the published snapshot, or `None` once
    /// `timeout` elapses. Returns immediately when it already holds.
    pub(crate) async fn wait_for(
        &self,
        timeout: Duration,
        mut done: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        let mut rx = self.state_tx.subscribe();
        let snapshot = match tokio::time::timeout(timeout, rx.wait_for(|s| done(s))).await {
            Ok(Ok(snapshot)) => Some(snapshot.clone()),
            // The sender lives in `self`, so the channel cannot close here.
            Ok(Err(_)) | Err(_) => None,
        };
        snapshot
    }
}

fn apply(s: &mut SessionSnapshot, event: EngineEvent) {
    match event {
        EngineEvent::Id(name) => s.engine_name = Some(name),
        EngineEvent::UciAck => s.uci_ok = true,
        EngineEvent::ReadyAck => s.ready = true,
        EngineEvent::BestMove(best) => {
            s.best_move = Some(best);
            s.responses += 1;
            s.completions += 1;
            if s.state == SessionState::Analyzing {
                s.state = SessionState::Ready;
            }
        }
        EngineEvent::SearchInfo(info) => s.search = info,
        EngineEvent::ScoreInfo(score) => {
            s.score = Some(score);
            s.responses += 1;
        }
    }
}
