//! Client-side reconciliation of local drawing and relay events.
//!
//! The [`Synchronizer`] owns the local drawing state (strokes and the live
//! cursors of other participants). Local pointer input and inbound relay
//! messages both mutate it; outbound messages are queued as JSON strings and
//! drained by the transport owner with [`Synchronizer::take_outgoing`].

use std::collections::HashMap;

use kurbo::Point;
use thiserror::Error;

use crate::event::{CursorEvent, Event, ParticipantId};
use crate::stroke::{MemoryStrokeLog, Stroke, StrokeLog};

/// Errors from local drawing operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("no stroke in progress")]
    NoStrokeInProgress,
}

/// Local state changes caused by inbound relay messages.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A remote participant finished a stroke, stored at `index`.
    StrokeAdded { index: usize },
    /// A remote participant moved their pointer.
    CursorMoved { participant: ParticipantId, position: Point },
    /// A remote participant disconnected.
    ParticipantLeft { participant: ParticipantId },
    /// The relay assigned this client's session identity.
    SessionAssigned { participant: ParticipantId },
}

/// Local drawing state plus the outbound queue towards the relay.
pub struct Synchronizer<L: StrokeLog = MemoryStrokeLog> {
    strokes: L,
    /// Last known pointer position per remote participant.
    cursors: HashMap<ParticipantId, Point>,
    /// Own identity; provisional until the relay sends `welcome`.
    local_id: ParticipantId,
    /// Index of the stroke being drawn, if any.
    drawing: Option<usize>,
    connected: bool,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
}

impl Synchronizer {
    /// Create a disconnected synchronizer backed by an in-memory stroke log.
    pub fn new() -> Self {
        Self::with_log(MemoryStrokeLog::new())
    }
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: StrokeLog> Synchronizer<L> {
    /// Create a disconnected synchronizer on top of an existing stroke log.
    pub fn with_log(strokes: L) -> Self {
        Self {
            strokes,
            cursors: HashMap::new(),
            local_id: ParticipantId::random(),
            drawing: None,
            connected: false,
            outgoing: Vec::new(),
        }
    }

    // --- Local input ---

    /// Start a new stroke at `point`. Nothing is sent until the stroke ends.
    pub fn begin_stroke(&mut self, point: Point) {
        if self.drawing.is_some() {
            // The previous pointer-up never arrived.
            self.end_stroke();
        }
        self.drawing = Some(self.strokes.push(Stroke::starting_at(point)));
    }

    /// Append `point` to the stroke in progress and announce the cursor position.
    pub fn extend_stroke(&mut self, point: Point) -> Result<(), SyncError> {
        let stroke = self
            .drawing
            .and_then(|index| self.strokes.get_mut(index))
            .ok_or(SyncError::NoStrokeInProgress)?;
        stroke.add_point(point);

        let cursor = CursorEvent::new(point.x, point.y).tagged(self.local_id.clone());
        self.queue(&Event::Cursor(cursor));
        Ok(())
    }

    /// Finish the stroke in progress and queue it for the relay.
    ///
    /// Returns the committed stroke, or `None` if nothing was being drawn.
    pub fn end_stroke(&mut self) -> Option<&Stroke> {
        let index = self.drawing.take()?;
        let stroke = self.strokes.get(index)?.clone();
        self.queue(&Event::Stroke(stroke));
        self.strokes.get(index)
    }

    /// Clear the local canvas. Other participants are not affected.
    pub fn reset(&mut self) {
        self.strokes.clear();
        self.drawing = None;
    }

    // --- Inbound ---

    /// Apply one raw message received from the relay.
    ///
    /// Malformed messages are logged and dropped.
    pub fn handle_message(&mut self, raw: &str) -> Option<SyncEvent> {
        match Event::parse(raw) {
            Ok(event) => self.apply(event),
            Err(e) => {
                log::warn!("Dropping malformed relay message: {}", e);
                None
            }
        }
    }

    /// Apply one decoded relay event.
    pub fn apply(&mut self, event: Event) -> Option<SyncEvent> {
        match event {
            Event::Stroke(stroke) => {
                let index = self.strokes.push(stroke);
                Some(SyncEvent::StrokeAdded { index })
            }
            Event::Cursor(cursor) => {
                let Some(participant) = cursor.user_id else {
                    log::debug!("Ignoring cursor without participant id");
                    return None;
                };
                if participant == self.local_id {
                    return None;
                }
                let position = Point::new(cursor.x, cursor.y);
                self.cursors.insert(participant.clone(), position);
                Some(SyncEvent::CursorMoved {
                    participant,
                    position,
                })
            }
            Event::Welcome(participant) => {
                log::info!("Relay assigned session id {}", participant);
                self.cursors.remove(&participant);
                self.local_id = participant.clone();
                Some(SyncEvent::SessionAssigned { participant })
            }
            Event::Leave(participant) => {
                if participant == self.local_id {
                    return None;
                }
                self.cursors.remove(&participant);
                Some(SyncEvent::ParticipantLeft { participant })
            }
        }
    }

    // --- Connection ---

    /// Record whether the transport is up.
    ///
    /// Going offline discards pending messages and remote cursors; coming back
    /// starts a fresh session identity. Missed history is not replayed.
    pub fn set_connected(&mut self, connected: bool) {
        if connected == self.connected {
            return;
        }
        if connected {
            self.local_id = ParticipantId::random();
        } else {
            self.outgoing.clear();
            self.cursors.clear();
        }
        self.connected = connected;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    /// Check if there are pending outgoing messages.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    fn queue(&mut self, event: &Event) {
        if !self.connected {
            return;
        }
        match event.to_json() {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::warn!("Not sending local {}: {}", event.kind(), e),
        }
    }

    // --- Read access for rendering ---

    /// All strokes in z-order, including the one being drawn.
    pub fn strokes(&self) -> &[Stroke] {
        self.strokes.as_slice()
    }

    pub fn stroke_log(&self) -> &L {
        &self.strokes
    }

    /// Remote cursor positions.
    pub fn cursors(&self) -> &HashMap<ParticipantId, Point> {
        &self.cursors
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    /// The stroke currently being drawn.
    pub fn current_stroke(&self) -> Option<&Stroke> {
        self.drawing.and_then(|index| self.strokes.get(index))
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing.is_some()
    }
}
