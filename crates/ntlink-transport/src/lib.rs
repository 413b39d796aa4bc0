//! Transport abstraction layer for ntlink.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! how the client reaches the server, the [`Frame`] type that keeps text
//! and binary traffic apart, and the [`LinkState`] machine that tracks the
//! client's single link.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client via `tokio-tungstenite`

mod error;
mod state;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use state::LinkState;
#[cfg(feature = "websocket")]
pub use websocket::{SUBPROTOCOL, WebSocketConnection, WebSocketConnector};

use std::fmt;
use std::future::Future;

/// Opaque identifier for one connection attempt.
///
/// Every successful connect gets a fresh id, so log lines from before and
/// after a reconnect can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One unit of traffic on the link.
///
/// The protocol runs two encodings over the same connection: JSON control
/// messages travel as text frames and packed value records as binary
/// frames. The two are never mixed in a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A textual control-plane frame.
    Text(String),
    /// A binary value-plane frame.
    Binary(Vec<u8>),
}

impl Frame {
    /// Returns `true` for [`Frame::Binary`].
    pub fn is_binary(&self) -> bool {
        matches!(self, Frame::Binary(_))
    }
}

/// Opens outgoing connections.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;
    /// The error type for connect attempts.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens a connection to `url`.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single connection that can send and receive frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends a frame to the server.
    fn send(
        &self,
        frame: Frame,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame from the server.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Frame>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_frame_is_binary() {
        assert!(Frame::Binary(vec![1]).is_binary());
        assert!(!Frame::Text("[]".into()).is_binary());
    }
}
