//! Participant registry and broadcast.
//!
//! Every connection gets a random session id and its own unbounded outbound
//! queue. Broadcasting only pushes onto those queues, so a slow peer never
//! delays delivery to the others; per-connection send tasks drain them.

use std::sync::{PoisonError, RwLock};

use dashmap::DashMap;
use inkboard_core::{Event, EventError, ParticipantId};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Receiving end of a participant's outbound queue.
pub type Outbound = mpsc::UnboundedReceiver<String>;

/// Reasons an inbound message is dropped instead of forwarded.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Malformed(#[from] EventError),
    #[error("clients may not send {0} messages")]
    ReservedMessage(&'static str),
    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),
}

/// The broadcast hub. Stores no drawing state.
#[derive(Default)]
pub struct Relay {
    /// Live connections: session id → outbound queue.
    participants: DashMap<ParticipantId, mpsc::UnboundedSender<String>>,
    /// Held shared while forwarding and exclusively while removing, so a
    /// participant's `leave` is queued after everything it sent.
    membership: RwLock<()>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection.
    ///
    /// The returned queue already holds the `welcome` message carrying the new
    /// id, ahead of any broadcast.
    pub fn connect(&self) -> (ParticipantId, Outbound) {
        let id = ParticipantId::random();
        let (tx, rx) = mpsc::unbounded_channel();
        match Event::Welcome(id.clone()).to_json() {
            Ok(json) => {
                let _ = tx.send(json);
            }
            Err(e) => error!(participant = %id, "Failed to encode welcome: {}", e),
        }
        self.participants.insert(id.clone(), tx);
        (id, rx)
    }

    /// Forward one message from `from` to every other participant.
    ///
    /// Cursor events are tagged with the sender's id; strokes are forwarded
    /// as received. Returns the number of peers the message was queued for.
    pub fn on_message(&self, from: &ParticipantId, raw: &str) -> Result<usize, RelayError> {
        let _forwarding = self.membership.read().unwrap_or_else(PoisonError::into_inner);
        if !self.participants.contains_key(from) {
            return Err(RelayError::UnknownParticipant(from.clone()));
        }
        let json = match Event::parse_from_client(raw)? {
            Event::Cursor(cursor) => Event::Cursor(cursor.tagged(from.clone())).to_json()?,
            Event::Stroke(_) => raw.to_owned(),
            other => return Err(RelayError::ReservedMessage(other.kind())),
        };
        Ok(self.broadcast(from, &json))
    }

    /// Remove a connection and tell the remaining participants it left.
    ///
    /// Idempotent; returns whether the connection was still registered.
    pub fn disconnect(&self, id: &ParticipantId) -> bool {
        let removed = {
            let _removing = self.membership.write().unwrap_or_else(PoisonError::into_inner);
            self.participants.remove(id)
        };
        let Some((id, _tx)) = removed else {
            return false;
        };
        match Event::Leave(id.clone()).to_json() {
            Ok(json) => {
                self.broadcast(&id, &json);
            }
            Err(e) => error!(participant = %id, "Failed to encode leave: {}", e),
        }
        true
    }

    /// Number of live connections.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn is_connected(&self, id: &ParticipantId) -> bool {
        self.participants.contains_key(id)
    }

    fn broadcast(&self, from: &ParticipantId, json: &str) -> usize {
        let mut delivered = 0;
        for entry in self.participants.iter() {
            if entry.key() == from {
                continue;
            }
            if entry.value().send(json.to_owned()).is_ok() {
                delivered += 1;
            } else {
                debug!(participant = %entry.key(), "Outbound queue closed, skipping");
            }
        }
        delivered
    }
}
