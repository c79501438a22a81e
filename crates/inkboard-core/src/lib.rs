//! Inkboard Core Library
//!
//! Wire events and client-side synchronization for the Inkboard shared
//! whiteboard. Rendering and input handling live outside this crate; they
//! drive a [`Session`] (or a bare [`Synchronizer`]) and read its state.

pub mod client;
pub mod event;
pub mod session;
pub mod stroke;
pub mod synchronizer;

pub use client::{ConnectionState, NativeWebSocket, TransportError, TransportEvent};
pub use event::{CursorEvent, Event, EventError, ParticipantId};
pub use kurbo::Point;
pub use session::Session;
pub use stroke::{MemoryStrokeLog, Stroke, StrokeLog};
pub use synchronizer::{SyncError, SyncEvent, Synchronizer};
