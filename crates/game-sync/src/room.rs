//! In-process pub/sub shared by peers.
//!
//! A [`Room`] is a broadcast channel of encoded [`PeerEvent`]s. Each peer
//! joins as a [`RoomMember`] and receives what every other member publishes,
//! never its own events.

use crate::protocol::PeerEvent;
use crate::SyncError;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Events buffered per member before the slowest one starts losing them.
pub const DEFAULT_ROOM_CAPACITY: usize = 100;

pub type MemberId = u64;

/// An event as it travels through the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub sender: MemberId,
    pub name: &'static str,
    pub payload: String,
}

pub struct Room {
    tx: broadcast::Sender<Envelope>,
    next_member: AtomicU64,
}

impl Default for Room {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_CAPACITY)
    }
}

impl Room {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            next_member: AtomicU64::new(1),
        }
    }

    pub fn join(&self) -> RoomMember {
        let id = self.next_member.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("member {} joined the room", id);
        RoomMember {
            id,
            tx: self.tx.clone(),
            rx: self.tx.subscribe(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Publishes on behalf of a member without borrowing it.
#[derive(Clone)]
pub struct RoomPublisher {
    id: MemberId,
    tx: broadcast::Sender<Envelope>,
}

impl RoomPublisher {
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Broadcasts `event` to the other members.
    ///
    /// Returns how many members (including the sender) were listening.
    pub fn publish(&self, event: &PeerEvent) -> Result<usize, SyncError> {
        let envelope = Envelope {
            sender: self.id,
            name: event.name(),
            payload: event.payload()?,
        };
        tracing::debug!("member {} > {} {}", self.id, envelope.name, envelope.payload);
        Ok(self.tx.send(envelope).unwrap_or(0))
    }
}

/// One peer's handle on a [`Room`].
pub struct RoomMember {
    id: MemberId,
    tx: broadcast::Sender<Envelope>,
    rx: broadcast::Receiver<Envelope>,
}

impl RoomMember {
    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn publisher(&self) -> RoomPublisher {
        RoomPublisher {
            id: self.id,
            tx: self.tx.clone(),
        }
    }

    pub fn publish(&self, event: &PeerEvent) -> Result<usize, SyncError> {
        self.publisher().publish(event)
    }

    /// Waits for the next event from another member.
    ///
    /// Undecodable events are logged and skipped. Returns `None` once the
    /// channel is closed.
    pub async fn recv(&mut self) -> Option<PeerEvent> {
        loop {
            let envelope = match self.rx.recv().await {
                Ok(envelope) => envelope,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("member {} missed {} room events", self.id, n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };
            if envelope.sender == self.id {
                continue;
            }
            match PeerEvent::decode(envelope.name, &envelope.payload) {
                Ok(event) => return Some(event),
                Err(e) => {
                    tracing::warn!(
                        "member {} ignoring '{}' event from {}: {}",
                        self.id,
                        envelope.name,
                        envelope.sender,
                        e
                    );
                }
            }
        }
    }

    /// Like [`recv`](Self::recv) but returns `None` instead of waiting.
    pub fn try_recv(&mut self) -> Option<PeerEvent> {
        loop {
            let envelope = match self.rx.try_recv() {
                Ok(envelope) => envelope,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("member {} missed {} room events", self.id, n);
                    continue;
                }
                Err(_) => return None,
            };
            if envelope.sender == self.id {
                continue;
            }
            match PeerEvent::decode(envelope.name, &envelope.payload) {
                Ok(event) => return Some(event),
                Err(e) => tracing::warn!("member {} ignoring '{}' event: {}", self.id, envelope.name, e),
            }
        }
    }
}
