//! Engine subprocess plumbing.

use chess_analysis::{EngineSession, SessionState};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("empty engine command")]
    EmptyCommand,
    #[error("failed to start engine '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("engine process has no {0}")]
    MissingPipe(&'static str),
}

/// A running engine process wired to an [`EngineSession`].
///
/// Lines the session sends are written to the engine's stdin by a writer
/// task; every stdout line is fed to [`EngineSession::handle_line`] by a
/// reader task. The session fails when stdout closes.
pub struct ProcessTransport {
    child: Child,
    session: Arc<EngineSession>,
}

impl ProcessTransport {
    /// Spawn `command` (program and arguments, whitespace separated).
    pub fn spawn(command: &str) -> Result<Self, TransportError> {
        let parts: Vec<&str> = command.split_whitespace().collect();
        let (program, args) = parts.split_first().ok_or(TransportError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or(TransportError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TransportError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(TransportError::MissingPipe("stderr"))?;

        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        let session = Arc::new(EngineSession::new(line_tx));

        tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                if stdin.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.write_all(b"\n").await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        let reader_session = session.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                reader_session.handle_line(&line);
            }
            if reader_session.state() == SessionState::Idle {
                tracing::debug!("Engine exited");
            } else {
                tracing::warn!("Engine output closed unexpectedly");
            }
            reader_session.fail();
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!("engine stderr: {}", line);
            }
        });

        tracing::info!("Started engine: {}", command);
        Ok(Self { child, session })
    }

    pub fn session(&self) -> &Arc<EngineSession> {
        &self.session
    }

    /// Ask the engine to quit, then kill it if it lingers.
    pub async fn stop(mut self) {
        self.session.shutdown();

        let exited = tokio::time::timeout(Duration::from_millis(500), self.child.wait()).await;
        if !matches!(exited, Ok(Ok(_))) {
            let _ = self.child.kill().await;
        }
    }
}
