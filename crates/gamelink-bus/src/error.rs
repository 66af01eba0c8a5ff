use crate::ConnectionId;

/// Errors that can occur in the realtime layer.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The WebSocket upgrade handshake failed.
    #[error("websocket handshake failed: {0}")]
    HandshakeFailed(
        #[source] tokio_tungstenite::tungstenite::Error,
    ),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] tokio_tungstenite::tungstenite::Error),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(
        #[source] tokio_tungstenite::tungstenite::Error,
    ),

    /// The connection is not registered with the bus (never registered,
    /// or already dropped).
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
}
