use gamelink_protocol::{SessionId, UserId};
use thiserror::Error;

/// Errors from the session layer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The coordinator task for this session is gone (channel closed).
    #[error("session {0} coordinator unavailable")]
    Unavailable(SessionId),

    /// The store rejected or failed an operation.
    #[error(transparent)]
    Store(#[from] gamelink_store::StoreError),

    /// The store did not answer within the configured deadline. The
    /// caller sees a transient-failure error event; no broadcast happens.
    #[error("store operation timed out")]
    StoreTimeout,

    /// The realtime bus rejected an operation.
    #[error(transparent)]
    Bus(#[from] gamelink_bus::BusError),

    /// A challenge named a buddy the challenger is not matched with.
    #[error("user {challenger} is not matched with user {buddy}")]
    NotMatched {
        challenger: UserId,
        buddy: UserId,
    },

    /// A directory lookup (pairing, profile, notification) failed.
    #[error("directory: {0}")]
    Directory(String),
}
