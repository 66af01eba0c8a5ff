use gamelink_protocol::{SessionId, UserId};
use thiserror::Error;

/// Errors produced by `GameStore` implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No session with this id exists.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The session already reached a terminal status; re-finalizing or
    /// re-abandoning it is rejected so ratings are applied exactly once.
    #[error("session {0} is already terminal")]
    AlreadyTerminal(SessionId),

    /// A session cannot pair a user with themselves.
    #[error("user {0} cannot play against themselves")]
    SameParticipants(UserId),

    /// Underlying sqlite failure.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
