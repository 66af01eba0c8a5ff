//! Durable session storage for Gamelink.
//!
//! This crate is the source of truth for game sessions: the coordinator
//! mutates sessions through the [`GameStore`] trait, and a client that
//! reconnects or polls observes whatever the store last durably recorded.
//! It also owns the append-only history ledger and the per-user tallies
//! (rating, games played/won, points) that the termination pipeline
//! updates exactly once per scored game.
//!
//! # Key types
//!
//! - [`GameSession`] / [`SessionStatus`]: one session row and its
//!   forward-only lifecycle
//! - [`ParticipantRole`]: the {PlayerOne, PlayerTwo, Neither} tag every
//!   handler uses instead of ad-hoc id comparisons
//! - [`GameStore`]: the persistence seam
//! - [`MemoryStore`]: in-process implementation for tests and demos
//! - [`SqliteStore`]: transactional sqlite implementation
//!
//! # Persistence contract
//!
//! Every mutation must be durable before the corresponding broadcast goes
//! out, and [`GameStore::finalize`] performs the terminal status flip, the
//! ledger append, and both tally updates as one atomic unit. A session
//! that is already terminal rejects a second finalization
//! ([`StoreError::AlreadyTerminal`]) so duplicate termination events can
//! never double-score.

#![allow(async_fn_in_trait)]

mod error;
mod memory;
mod model;
mod sqlite;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::{GameHistory, GameSession, ParticipantRole, PlayerTally};
pub use sqlite::SqliteStore;
pub use store::{
    GameStore, NewSession, SessionOutcome, POINTS_DRAW, POINTS_LOSS,
    POINTS_WIN,
};

// Re-exported so store users don't need a direct protocol dependency for
// the status enum that lives in session rows.
pub use gamelink_protocol::SessionStatus;
