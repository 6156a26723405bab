//! The set of live games and how remote snapshots are folded into it.

use crate::protocol::PeerEvent;
use crate::SyncError;
use chess_game::{HalfMove, PgnError, PlayedMove, Position};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

pub type GameId = u32;

/// A registered game. Readers never observe a half-applied reload: merges
/// swap the whole [`Position`] under the write lock.
pub type SharedGame = Arc<RwLock<Position>>;

/// The shareable form of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Written as a number; older peers send it as a string, which is accepted.
    #[serde(deserialize_with = "id_from_wire")]
    pub id: GameId,
    pub pgn: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(GameId),
    Text(String),
}

fn id_from_wire<'de, D: Deserializer<'de>>(deserializer: D) -> Result<GameId, D::Error> {
    match WireId::deserialize(deserializer)? {
        WireId::Number(id) => Ok(id),
        WireId::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// What a [`GameRegistry::merge`] did.
#[derive(Debug, Default, PartialEq)]
pub struct MergeReport {
    pub created: Vec<GameId>,
    pub replaced: Vec<GameId>,
    /// Entries left untouched because their PGN did not load.
    pub skipped: Vec<(GameId, PgnError)>,
}

struct Inner {
    /// In registration order.
    games: Vec<(GameId, SharedGame)>,
    next_id: GameId,
}

impl Inner {
    fn find(&self, id: GameId) -> Option<&SharedGame> {
        self.games
            .iter()
            .find(|(game_id, _)| *game_id == id)
            .map(|(_, game)| game)
    }
}

/// Games known to this process, keyed by id.
pub struct GameRegistry {
    inner: Mutex<Inner>,
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn read(game: &SharedGame) -> std::sync::RwLockReadGuard<'_, Position> {
    game.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write(game: &SharedGame) -> std::sync::RwLockWriteGuard<'_, Position> {
    game.write().unwrap_or_else(PoisonError::into_inner)
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                games: Vec::new(),
                next_id: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a game under `id`.
    ///
    /// Registering an id twice keeps the first game; the call returns `None`.
    pub fn register(&self, id: GameId, position: Position) -> Option<SharedGame> {
        let mut inner = self.lock();
        if inner.find(id).is_some() {
            tracing::warn!("game of id {} already exists; keeping the registered one", id);
            return None;
        }
        let game = Arc::new(RwLock::new(position));
        inner.games.push((id, game.clone()));
        tracing::debug!("registered game {}", id);
        Some(game)
    }

    /// Hands out the next unused id.
    pub fn next_id(&self) -> GameId {
        let mut inner = self.lock();
        let mut id = inner.next_id;
        while inner.find(id).is_some() {
            id += 1;
        }
        inner.next_id = id + 1;
        id
    }

    pub fn get(&self, id: GameId) -> Option<SharedGame> {
        self.lock().find(id).cloned()
    }

    pub fn contains(&self, id: GameId) -> bool {
        self.lock().find(id).is_some()
    }

    pub fn ids(&self) -> Vec<GameId> {
        self.lock().games.iter().map(|(id, _)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registered game as `{id, pgn}`, in registration order.
    pub fn snapshot(&self) -> Vec<GameSnapshot> {
        let games = self.lock().games.clone();
        games
            .iter()
            .map(|(id, game)| GameSnapshot {
                id: *id,
                pgn: read(game).to_pgn(),
            })
            .collect()
    }

    /// Plays a move in a registered game.
    pub fn apply_move(&self, id: GameId, mv: HalfMove) -> Result<PlayedMove, SyncError> {
        let game = self.get(id).ok_or(SyncError::UnknownGame(id))?;
        let mut position = write(&game);
        Ok(position.play(mv)?.clone())
    }

    /// Replaces a game's history with `pgn`. The game is unchanged on error.
    pub fn reload(&self, id: GameId, pgn: &str) -> Result<(), SyncError> {
        let game = self.get(id).ok_or(SyncError::UnknownGame(id))?;
        let parsed = Position::from_pgn(pgn)?;
        *write(&game) = parsed;
        Ok(())
    }

    /// Adopts a remote snapshot.
    ///
    /// Known ids get their whole history replaced by the remote PGN; unknown
    /// ids are handed to `create_missing(pgn, id)`, which is expected to build
    /// and [`register`](Self::register) the game; only ids it registered are
    /// reported as created. An entry whose PGN does not
    /// load is skipped and the rest of the batch still applies. The id counter
    /// drops to the lowest id the remote mentions.
    pub fn merge<F>(&self, remote: &[GameSnapshot], mut create_missing: F) -> MergeReport
    where
        F: FnMut(&str, GameId),
    {
        let mut report = MergeReport::default();

        for entry in remote {
            // Not held across `create_missing`, which registers.
            let existing = {
                let mut inner = self.lock();
                if entry.id < inner.next_id {
                    inner.next_id = entry.id;
                }
                inner.find(entry.id).cloned()
            };

            let Some(game) = existing else {
                create_missing(&entry.pgn, entry.id);
                if self.contains(entry.id) {
                    report.created.push(entry.id);
                }
                continue;
            };

            match Position::from_pgn(&entry.pgn) {
                Ok(parsed) => {
                    *write(&game) = parsed;
                    report.replaced.push(entry.id);
                }
                Err(e) => {
                    tracing::warn!("skipping game {} in synchronize: {}", entry.id, e);
                    report.skipped.push((entry.id, e));
                }
            }
        }

        tracing::debug!(
            "merge: {} created, {} replaced, {} skipped",
            report.created.len(),
            report.replaced.len(),
            report.skipped.len()
        );
        report
    }

    /// Applies an event received from a peer. Returns the ids it touched.
    ///
    /// Nothing is re-broadcast: peers apply each other's events, they do not
    /// relay them.
    pub fn apply_event(&self, event: &PeerEvent) -> Result<Vec<GameId>, SyncError> {
        match event {
            PeerEvent::Move { game_id, mv } => {
                self.apply_move(*game_id, *mv)?;
                Ok(vec![*game_id])
            }
            PeerEvent::Add { pgn } => {
                let position = Position::from_pgn(pgn)?;
                let id = self.next_id();
                self.register(id, position);
                Ok(vec![id])
            }
            PeerEvent::Synchronize(games) => {
                let report = self.merge(games, |pgn, id| match Position::from_pgn(pgn) {
                    Ok(position) => {
                        self.register(id, position);
                    }
                    Err(e) => tracing::warn!("cannot create game {} from synchronize: {}", id, e),
                });
                Ok(report.created.into_iter().chain(report.replaced).collect())
            }
        }
    }
}
