//! # Gamelink
//!
//! Realtime paired game sessions over WebSocket: two matched users play a
//! turn-based game while the server relays moves, persists resumable
//! state, and scores finished games exactly once.
//!
//! The server is rule-agnostic: move legality lives in the clients, and
//! the server's contract is durability, fan-out, and scoring. Plug in a
//! [`GameStore`] for persistence, an [`Authenticator`] for identity, and
//! a directory (pairing + profiles + notifications) for the surrounding
//! platform.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gamelink::{GamelinkServerBuilder, MemoryDirectory, MemoryStore, TokenIsUserId};
//!
//! # async fn run() -> Result<(), gamelink::GamelinkError> {
//! let server = GamelinkServerBuilder::new()
//!     .bind("127.0.0.1:8080")
//!     .build(MemoryStore::new(), MemoryDirectory::new(), TokenIsUserId)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod auth;
mod error;
mod handler;
mod server;

pub use auth::{AuthError, Authenticator, TokenIsUserId};
pub use error::GamelinkError;
pub use server::{GamelinkServer, GamelinkServerBuilder, PROTOCOL_VERSION};

// Re-exports so embedders can assemble a server from this crate alone.
pub use gamelink_bus::{RealtimeBus, Room};
pub use gamelink_protocol::{
    ClientEvent, GameId, ServerEvent, SessionId, SessionStatus, UserId,
};
pub use gamelink_session::{
    ChallengeDispatcher, CoordinatorConfig, MemoryDirectory,
    NotificationSink, PairingDirectory, ProfileLookup, SessionRouter,
};
pub use gamelink_store::{GameStore, MemoryStore, SqliteStore};
