//! Inkboard WebSocket Relay
//!
//! Fans drawing events out between everyone connected to the relay. Nothing
//! is stored: a participant only sees what is sent while they are connected.
//!
//! ## Protocol
//!
//! See [`inkboard_core::event`]. On connect the relay sends
//! `{"type":"welcome","userId":...}`; cursor events are stamped with the
//! sender's `userId`; strokes are forwarded untouched; when a connection
//! closes the others get `{"type":"leave","userId":...}`.

pub mod config;
pub mod relay;
pub mod server;

pub use config::Config;
pub use relay::{Outbound, Relay, RelayError};
pub use server::{router, serve};
