//! WebSocket transport via `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use crate::{BusError, ConnectionId};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// Accepts incoming WebSocket connections.
pub struct WsListener {
    listener: TcpListener,
}

impl WsListener {
    /// Binds a listener to the given address.
    pub async fn bind(addr: &str) -> Result<Self, BusError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(BusError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    /// The address the listener actually bound to. Needed when binding
    /// to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, BusError> {
        self.listener.local_addr().map_err(BusError::AcceptFailed)
    }

    /// Waits for the next connection and performs the upgrade handshake.
    pub async fn accept(&mut self) -> Result<WsConnection, BusError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(BusError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(BusError::HandshakeFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        Ok(WsConnection {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// A single WebSocket connection.
///
/// Sink and stream are locked independently: the writer task pushes
/// broadcasts out while the reader sits parked in [`recv`](Self::recv)
/// waiting for the client's next event.
pub struct WsConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WsConnection {
    /// Sends one text frame.
    pub async fn send(&self, text: &str) -> Result<(), BusError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(BusError::SendFailed)
    }

    /// Receives the next text payload.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed. Binary
    /// frames are accepted if they hold valid UTF-8; control frames are
    /// skipped.
    pub async fn recv(&self) -> Result<Option<String>, BusError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.to_string()));
                }
                Some(Ok(Message::Binary(data))) => {
                    match String::from_utf8(data.into()) {
                        Ok(text) => return Ok(Some(text)),
                        Err(_) => {
                            tracing::debug!(
                                id = %self.id,
                                "ignoring non-UTF-8 binary frame"
                            );
                            continue;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => return Err(BusError::ReceiveFailed(e)),
            }
        }
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), BusError> {
        self.sink
            .lock()
            .await
            .send(Message::Close(None))
            .await
            .map_err(BusError::SendFailed)
    }

    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}
