//! WebSocket transport towards the relay.
//!
//! [`NativeWebSocket`] runs a blocking `tungstenite` connection on a background
//! thread. The owner sends text through a command channel and polls
//! [`TransportEvent`]s without blocking, so all drawing state stays on the
//! caller's thread.

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tungstenite::{connect, Message};
use url::Url;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid WebSocket URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
    #[error("transport thread has stopped")]
    ChannelClosed,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the transport thread.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Connected to the relay
    Connected,
    /// Connection closed, by either side
    Disconnected,
    /// One inbound message
    Message(String),
    /// Connecting failed
    Error { message: String },
}

/// Commands sent to the WebSocket thread.
enum WsCommand {
    Send(String),
    Close,
}

/// Check that `url` is a `ws://` or `wss://` URL.
pub fn validate_url(url: &str) -> Result<Url, TransportError> {
    let parsed = Url::parse(url)?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(TransportError::UnsupportedScheme(other.to_string())),
    }
}

/// WebSocket client for native platforms.
///
/// Uses a background thread for non-blocking operation.
pub struct NativeWebSocket {
    state: ConnectionState,
    /// Channel to send commands to the WebSocket thread.
    cmd_tx: Option<Sender<WsCommand>>,
    /// Channel to receive events from the WebSocket thread.
    event_rx: Option<Receiver<TransportEvent>>,
    /// Handle to the WebSocket thread.
    _thread: Option<JoinHandle<()>>,
}

impl NativeWebSocket {
    /// Create a new disconnected client.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            cmd_tx: None,
            event_rx: None,
            _thread: None,
        }
    }

    /// Connect to the relay. Completion is reported as [`TransportEvent::Connected`].
    pub fn connect(&mut self, url: &str) -> Result<(), TransportError> {
        if self.cmd_tx.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        let url = validate_url(url)?;

        self.state = ConnectionState::Connecting;

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<TransportEvent>();

        let handle = thread::spawn(move || run_socket(url, cmd_rx, event_tx));

        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        self._thread = Some(handle);

        Ok(())
    }

    /// Close the connection and forget any undelivered events.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(WsCommand::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Send a text message.
    pub fn send(&self, msg: &str) -> Result<(), TransportError> {
        let tx = self.cmd_tx.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(WsCommand::Send(msg.to_string()))
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Poll for pending events (non-blocking), in arrival order.
    pub fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        let mut finished = false;
        if let Some(ref rx) = self.event_rx {
            loop {
                match rx.try_recv() {
                    Ok(event) => {
                        match &event {
                            TransportEvent::Connected => self.state = ConnectionState::Connected,
                            TransportEvent::Disconnected => {
                                self.state = ConnectionState::Disconnected;
                                finished = true;
                            }
                            TransportEvent::Error { .. } => {
                                self.state = ConnectionState::Error;
                                finished = true;
                            }
                            TransportEvent::Message(_) => {}
                        }
                        events.push(event);
                        if finished {
                            // Nothing follows a terminal event.
                            break;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        finished = true;
                        break;
                    }
                }
            }
        }
        if finished {
            // Thread is done, even if it has not dropped its sender yet.
            self.cmd_tx = None;
            self.event_rx = None;
            self._thread = None;
        }
        events
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for NativeWebSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NativeWebSocket {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// At most the first 100 characters of `msg`, for log lines.
fn preview(msg: &str) -> &str {
    msg.char_indices().nth(100).map_or(msg, |(i, _)| &msg[..i])
}

/// Whether `e` only means the socket timed out and may be retried.
fn is_timeout(e: &tungstenite::Error) -> bool {
    matches!(
        e,
        tungstenite::Error::Io(io) if matches!(
            io.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        )
    )
}

/// Body of the transport thread.
fn run_socket(url: Url, cmd_rx: Receiver<WsCommand>, event_tx: Sender<TransportEvent>) {
    log::info!("WebSocket thread: connecting to {}", url);

    let (mut socket, response) = match connect(url.as_str()) {
        Ok(connected) => connected,
        Err(e) => {
            log::error!("WebSocket connection failed: {}", e);
            let _ = event_tx.send(TransportEvent::Error {
                message: format!("Connection failed: {}", e),
            });
            return;
        }
    };
    log::info!("WebSocket connected, status: {}", response.status());
    let _ = event_tx.send(TransportEvent::Connected);

    // Short read timeout so queued sends are not starved by a quiet relay.
    match socket.get_mut() {
        tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }
        #[allow(unreachable_patterns)]
        _ => log::debug!("TLS or other stream - using default timeout handling"),
    }

    loop {
        // Drain every queued send first so per-connection order is kept.
        loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(msg)) => {
                    log::debug!("WebSocket sending: {}", preview(&msg));
                    match socket.send(Message::Text(msg)) {
                        Ok(()) => {}
                        // The frame stays buffered; the flush after the next read finishes it.
                        Err(ref e) if is_timeout(e) => log::debug!("WebSocket send pending: {}", e),
                        Err(e) => {
                            log::error!("WebSocket send error: {}", e);
                            let _ = event_tx.send(TransportEvent::Disconnected);
                            return;
                        }
                    }
                }
                Ok(WsCommand::Close) => {
                    log::info!("WebSocket close requested");
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    let _ = event_tx.send(TransportEvent::Disconnected);
                    return;
                }
                Err(TryRecvError::Disconnected) => {
                    log::info!("WebSocket command channel disconnected");
                    let _ = socket.close(None);
                    return;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        match socket.read() {
            Ok(Message::Text(txt)) => {
                log::debug!("WebSocket received: {}", preview(&txt));
                let _ = event_tx.send(TransportEvent::Message(txt));
            }
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(txt) => {
                    let _ = event_tx.send(TransportEvent::Message(txt));
                }
                Err(e) => log::warn!("Dropping non UTF-8 binary message: {}", e),
            },
            Ok(Message::Close(_)) => {
                log::info!("WebSocket received close frame");
                break;
            }
            Ok(_) => {} // Ping is answered by tungstenite on the next write/flush
            Err(ref e) if is_timeout(e) => {
                // Flush any pending pong, close frame or partially written send.
                let _ = socket.flush();
            }
            Err(e) => {
                log::error!("WebSocket read error: {}", e);
                break;
            }
        }
    }

    log::info!("WebSocket thread exiting");
    let _ = event_tx.send(TransportEvent::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("ws://localhost:4000").is_ok());
        assert!(validate_url("wss://example.com/").is_ok());
        assert!(matches!(
            validate_url("http://localhost:4000"),
            Err(TransportError::UnsupportedScheme(s)) if s == "http"
        ));
        assert!(matches!(
            validate_url("not a url"),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_send_requires_connection() {
        let socket = NativeWebSocket::new();
        assert!(matches!(socket.send("[]"), Err(TransportError::NotConnected)));
        assert_eq!(socket.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_rejects_bad_scheme_without_spawning() {
        let mut socket = NativeWebSocket::new();
        assert!(socket.connect("ftp://localhost").is_err());
        assert_eq!(socket.state(), ConnectionState::Disconnected);
        assert!(socket.poll_events().is_empty());
    }

    #[test]
    fn test_connect_failure_reports_error() {
        // Bind then drop so the port is very likely closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut socket = NativeWebSocket::new();
        socket.connect(&format!("ws://127.0.0.1:{port}")).unwrap();
        assert_eq!(socket.state(), ConnectionState::Connecting);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while events.is_empty() && std::time::Instant::now() < deadline {
            events = socket.poll_events();
            thread::sleep(Duration::from_millis(10));
        }
        assert!(matches!(events.first(), Some(TransportEvent::Error { .. })));
        assert_eq!(socket.state(), ConnectionState::Error);
    }

    #[test]
    fn test_terminal_event_allows_reconnect_before_thread_exits() {
        for terminal in [
            TransportEvent::Disconnected,
            TransportEvent::Error {
                message: "Connection failed".into(),
            },
        ] {
            let (cmd_tx, _cmd_rx) = channel();
            let (event_tx, event_rx) = channel();
            let mut socket = NativeWebSocket {
                state: ConnectionState::Connected,
                cmd_tx: Some(cmd_tx),
                event_rx: Some(event_rx),
                _thread: None,
            };

            // The thread still holds its sender.
            event_tx.send(TransportEvent::Message("[]".into())).unwrap();
            event_tx.send(terminal.clone()).unwrap();
            assert_eq!(
                socket.poll_events(),
                vec![TransportEvent::Message("[]".into()), terminal]
            );

            assert!(matches!(socket.send("[]"), Err(TransportError::NotConnected)));
            assert!(matches!(
                socket.connect("ftp://localhost"),
                Err(TransportError::UnsupportedScheme(_))
            ));
            drop(event_tx);
        }
    }

    #[test]
    fn test_timeouts_are_not_fatal() {
        use std::io::{Error, ErrorKind};

        assert!(is_timeout(&tungstenite::Error::Io(Error::from(
            ErrorKind::WouldBlock
        ))));
        assert!(is_timeout(&tungstenite::Error::Io(Error::from(
            ErrorKind::TimedOut
        ))));
        assert!(!is_timeout(&tungstenite::Error::Io(Error::from(
            ErrorKind::ConnectionReset
        ))));
        assert!(!is_timeout(&tungstenite::Error::ConnectionClosed));
        assert!(!is_timeout(&tungstenite::Error::AlreadyClosed));
    }
}
