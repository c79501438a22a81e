//! A drawing session: one synchronizer wired to one relay connection.

use kurbo::Point;

use crate::client::{ConnectionState, NativeWebSocket, TransportError, TransportEvent};
use crate::stroke::{MemoryStrokeLog, Stroke, StrokeLog};
use crate::synchronizer::{SyncError, SyncEvent, Synchronizer};

/// Drives a [`Synchronizer`] from a [`NativeWebSocket`].
///
/// Input calls and [`Session::pump`] all run on the caller's thread, so local
/// drawing state is never mutated concurrently.
pub struct Session<L: StrokeLog = MemoryStrokeLog> {
    socket: NativeWebSocket,
    sync: Synchronizer<L>,
}

impl Session {
    /// Create a disconnected session with an in-memory stroke log.
    pub fn new() -> Self {
        Self::with_synchronizer(Synchronizer::new())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: StrokeLog> Session<L> {
    pub fn with_synchronizer(sync: Synchronizer<L>) -> Self {
        Self {
            socket: NativeWebSocket::new(),
            sync,
        }
    }

    /// Start connecting to the relay at `url`.
    pub fn connect(&mut self, url: &str) -> Result<(), TransportError> {
        self.socket.connect(url)
    }

    /// Close the relay connection. Drawing keeps working locally.
    pub fn disconnect(&mut self) {
        self.socket.disconnect();
        self.sync.set_connected(false);
    }

    pub fn begin_stroke(&mut self, point: Point) {
        self.sync.begin_stroke(point);
        self.flush();
    }

    pub fn extend_stroke(&mut self, point: Point) -> Result<(), SyncError> {
        self.sync.extend_stroke(point)?;
        self.flush();
        Ok(())
    }

    pub fn end_stroke(&mut self) -> Option<Stroke> {
        let stroke = self.sync.end_stroke().cloned();
        self.flush();
        stroke
    }

    /// Clear the local canvas only.
    pub fn reset(&mut self) {
        self.sync.reset();
    }

    /// Apply every transport event received so far, then flush outgoing messages.
    ///
    /// Returns the resulting state changes in the order they were applied.
    pub fn pump(&mut self) -> Vec<SyncEvent> {
        let mut changes = Vec::new();
        for event in self.socket.poll_events() {
            match event {
                TransportEvent::Connected => {
                    log::info!("Connected to relay");
                    self.sync.set_connected(true);
                }
                TransportEvent::Disconnected => {
                    log::info!("Disconnected from relay");
                    self.sync.set_connected(false);
                }
                TransportEvent::Error { message } => {
                    log::warn!("Relay connection error: {}", message);
                    self.sync.set_connected(false);
                }
                TransportEvent::Message(raw) => changes.extend(self.sync.handle_message(&raw)),
            }
        }
        self.flush();
        changes
    }

    fn flush(&mut self) {
        for msg in self.sync.take_outgoing() {
            if let Err(e) = self.socket.send(&msg) {
                log::warn!("Dropping outbound message: {}", e);
                self.sync.set_connected(false);
                break;
            }
        }
    }

    pub fn synchronizer(&self) -> &Synchronizer<L> {
        &self.sync
    }

    pub fn state(&self) -> ConnectionState {
        self.socket.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_session_draws_locally() {
        let mut session = Session::new();
        session.begin_stroke(Point::new(0.0, 0.0));
        session.extend_stroke(Point::new(3.0, 4.0)).unwrap();
        let stroke = session.end_stroke().unwrap();

        assert_eq!(stroke.len(), 2);
        assert_eq!(session.synchronizer().strokes(), &[stroke]);
        assert!(session.pump().is_empty());
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_reset_only_touches_local_state() {
        let mut session = Session::new();
        session.begin_stroke(Point::new(0.0, 0.0));
        session.end_stroke();
        session.reset();
        assert!(session.synchronizer().strokes().is_empty());
    }
}
