//! Move analysis on top of a UCI engine.
//!
//! # Overview
//!
//! - [`EngineSession`] - one conversation with an engine: handshake, commands
//!   out, parsed events in, state published as a [`SessionSnapshot`]
//! - [`Correlator`] - serializes best-move requests onto the session and
//!   attributes each `bestmove` to the request that caused it
//! - [`diff_scores`] - turns the scores of the played move, the previous ply and
//!   the best alternative into a [`Verdict`]
//!
//! # Example
//!
//! ```ignore
//! use chess_analysis::{AnalysisLimits, Correlator, EngineSession};
//!
//! let session = Arc::new(EngineSession::new(transport));
//! session.initialize(Duration::from_secs(10)).await?;
//! let correlator = Correlator::new(session, AnalysisLimits::default());
//! let best = correlator.analyze(&["e2e4".into()], None).await?;
//! let played = correlator.analyze(&["e2e4".into()], Some("e7e5")).await?;
//! ```

mod correlator;
mod session;
mod verdict;

pub use correlator::{AnalysisError, AnalysisLimits, AnalysisResult, Correlator, EngineRequest};
pub use session::{EngineSession, SessionError, SessionSnapshot, SessionState, Transport};
pub use verdict::{diff_scores, MoveClass, Verdict, SCORE_EPSILON};
