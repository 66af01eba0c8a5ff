//! Realtime fan-out for Gamelink.
//!
//! Two pieces live here:
//!
//! - [`RealtimeBus`]: the in-process room registry. Connections register
//!   an outbound event sender, subscribe to rooms, and events fan out to
//!   every subscriber (optionally excluding the originator, which already
//!   applied its own action locally).
//! - [`WsListener`] / [`WsConnection`]: the WebSocket transport via
//!   `tokio-tungstenite`. The connection splits its sink and stream so a
//!   broadcast can be written while a read is parked waiting for the
//!   client's next event.
//!
//! The bus is deliberately dumb: it knows nothing about sessions, turns,
//! or ratings. Ordering is only guaranteed per room relative to a single
//! broadcaster; the session layer gets that for free because each session
//! actor is the sole broadcaster for its game room.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
mod room;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::BusError;
pub use room::{RealtimeBus, Room};
#[cfg(feature = "websocket")]
pub use websocket::{WsConnection, WsListener};

use std::fmt;

/// Opaque identifier for a connection.
///
/// Distinct from [`UserId`](gamelink_protocol::UserId): a user may hold
/// several connections (browser tabs), and a connection has an id before
/// the handshake reveals who is on it.
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
