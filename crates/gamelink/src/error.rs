//! Unified error type for the Gamelink server.

use gamelink_bus::BusError;
use gamelink_protocol::ProtocolError;
use gamelink_session::SessionError;
use gamelink_store::StoreError;

use crate::AuthError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `gamelink` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GamelinkError {
    /// A realtime/transport error (bind, handshake, send, recv).
    #[error(transparent)]
    Bus(#[from] BusError),

    /// A protocol-level error (encode, decode, invalid event).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-layer error (coordinator, dispatch, store).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A storage error surfacing outside the session layer.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Handshake authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The client broke the handshake contract.
    #[error("handshake: {0}")]
    Handshake(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidEvent("bad".into());
        let top: GamelinkError = err.into();
        assert!(matches!(top, GamelinkError::Protocol(_)));
        assert!(top.to_string().contains("bad"));
    }

    #[test]
    fn test_from_auth_error() {
        let err = AuthError("nope".into());
        let top: GamelinkError = err.into();
        assert!(matches!(top, GamelinkError::Auth(_)));
    }

    #[test]
    fn test_from_store_error() {
        let err = StoreError::NotFound(gamelink_protocol::SessionId(1));
        let top: GamelinkError = err.into();
        assert!(matches!(top, GamelinkError::Store(_)));
    }
}
