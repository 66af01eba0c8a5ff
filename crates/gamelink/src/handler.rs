//! Per-connection handler: handshake, auth, and event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `handshake` → validate version
//!   2. Authenticate token → get UserId
//!   3. Register with the bus, subscribe the user room, send ack
//!   4. Loop: receive events → route to coordinators / dispatcher

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use gamelink_bus::{ConnectionId, RealtimeBus, Room, WsConnection};
use gamelink_protocol::{
    ClientEvent, Codec, ServerEvent, SessionId, UserId,
};
use gamelink_session::{
    CoordinatorHandle, NotificationSink, PairingDirectory, ProfileLookup,
    SessionError,
};
use gamelink_store::{GameStore, StoreError};
use tokio::sync::mpsc;

use crate::server::{PROTOCOL_VERSION, ServerState};
use crate::{Authenticator, GamelinkError};

/// How long the client has to open with a handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Read timeout for an established connection. Generous because
/// turn-based players sit idle while the opponent thinks; heartbeats
/// reset it.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Drop guard that unregisters the connection from the bus when the
/// handler exits, including on panic. `drop_connection` is synchronous,
/// so no task spawn is needed.
struct ConnGuard {
    conn_id: ConnectionId,
    bus: Arc<RealtimeBus>,
}

impl Drop for ConnGuard {
    fn drop(&mut self) {
        self.bus.drop_connection(self.conn_id);
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, A, D>(
    conn: WsConnection,
    state: Arc<ServerState<S, A, D>>,
) -> Result<(), GamelinkError>
where
    S: GameStore,
    A: Authenticator,
    D: PairingDirectory + ProfileLookup + NotificationSink,
{
    let conn_id = conn.id();
    let conn = Arc::new(conn);
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Handshake ---
    let user = perform_handshake(&conn, &state).await?;
    tracing::info!(%conn_id, %user, "user authenticated");

    // --- Step 2: Wire the connection into the bus ---
    // All outbound traffic funnels through one writer task; the bus and
    // the coordinators only ever touch the unbounded sender.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.bus.register(conn_id, tx);
    let _guard = ConnGuard {
        conn_id,
        bus: Arc::clone(&state.bus),
    };

    let writer = {
        let conn = Arc::clone(&conn);
        let codec = state.codec;
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let text = match codec
                    .encode(&event)
                    .map(String::from_utf8)
                {
                    Ok(Ok(text)) => text,
                    _ => {
                        tracing::warn!(%conn_id, "unencodable event");
                        continue;
                    }
                };
                if conn.send(&text).await.is_err() {
                    break;
                }
            }
        })
    };

    // Every connection of a user sits in their user room, so challenge
    // pushes reach all open tabs.
    state.bus.subscribe(Room::User(user), conn_id)?;
    state
        .bus
        .send_to(conn_id, ServerEvent::HandshakeAck { user_id: user })?;

    // --- Step 3: Event loop ---
    loop {
        let text = match tokio::time::timeout(READ_TIMEOUT, conn.recv())
            .await
        {
            Ok(Ok(Some(text))) => text,
            Ok(Ok(None)) => {
                tracing::info!(%user, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%user, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%user, "connection timed out");
                break;
            }
        };

        let event: ClientEvent = match state.codec.decode(text.as_bytes())
        {
            Ok(ev) => ev,
            Err(e) => {
                tracing::debug!(%user, error = %e, "undecodable event");
                report(&state, conn_id, 400, "invalid event");
                continue;
            }
        };

        if handle_event(&state, user, conn_id, event).await? {
            break;
        }
    }

    // Unregistering drops the bus's sender, so the writer drains its
    // queue and exits.
    drop(_guard);
    let _ = writer.await;
    let _ = conn.close().await;
    Ok(())
}

/// Performs the initial handshake: receive, validate version, auth.
async fn perform_handshake<S, A, D>(
    conn: &WsConnection,
    state: &Arc<ServerState<S, A, D>>,
) -> Result<UserId, GamelinkError>
where
    S: GameStore,
    A: Authenticator,
    D: PairingDirectory + ProfileLookup + NotificationSink,
{
    let text =
        match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
            Ok(Ok(Some(text))) => text,
            Ok(Ok(None)) => {
                return Err(GamelinkError::Handshake(
                    "connection closed before handshake".into(),
                ));
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(GamelinkError::Handshake(
                    "handshake timed out".into(),
                ));
            }
        };

    let (version, token) =
        match state.codec.decode(text.as_bytes()) {
            Ok(ClientEvent::Handshake { version, token }) => {
                (version, token)
            }
            Ok(_) => {
                send_direct(conn, state, 400, "expected handshake").await;
                return Err(GamelinkError::Handshake(
                    "first event must be handshake".into(),
                ));
            }
            Err(e) => {
                send_direct(conn, state, 400, "invalid handshake").await;
                return Err(e.into());
            }
        };

    if version != PROTOCOL_VERSION {
        let message = format!(
            "version mismatch: expected {PROTOCOL_VERSION}, got {version}"
        );
        send_direct(conn, state, 400, &message).await;
        return Err(GamelinkError::Handshake(message));
    }

    let token = token.as_deref().unwrap_or("");
    match state.auth.authenticate(token).await {
        Ok(user) => Ok(user),
        Err(e) => {
            send_direct(conn, state, 401, "unauthorized").await;
            Err(e.into())
        }
    }
}

/// Routes one decoded event. Returns `true` when the connection should
/// close.
async fn handle_event<S, A, D>(
    state: &Arc<ServerState<S, A, D>>,
    user: UserId,
    conn_id: ConnectionId,
    event: ClientEvent,
) -> Result<bool, GamelinkError>
where
    S: GameStore,
    A: Authenticator,
    D: PairingDirectory + ProfileLookup + NotificationSink,
{
    match event {
        ClientEvent::Handshake { .. } => {
            // Already shaken; a repeat is a client bug, not fatal.
            report(state, conn_id, 400, "already connected");
        }

        ClientEvent::Heartbeat { client_time } => {
            let _ = state.bus.send_to(
                conn_id,
                ServerEvent::HeartbeatAck {
                    client_time,
                    server_time: unix_millis(),
                },
            );
        }

        ClientEvent::Join { session_id } => {
            let Some(handle) =
                session_handle(state, session_id, conn_id).await
            else {
                return Ok(false);
            };
            match handle.join(user, conn_id).await {
                Ok(Some(snapshot)) => {
                    let _ = state.bus.send_to(
                        conn_id,
                        ServerEvent::InitGame(snapshot),
                    );
                }
                // Unknown session or not a participant: stay silent.
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%user, error = %e, "join failed");
                }
            }
        }

        ClientEvent::Ready { session_id } => {
            if let Some(handle) =
                session_handle(state, session_id, conn_id).await
            {
                let _ = handle.ready(user, conn_id).await;
            }
        }

        ClientEvent::Move {
            session_id,
            mv,
            state: board,
        } => {
            if let Some(handle) =
                session_handle(state, session_id, conn_id).await
            {
                let _ =
                    handle.submit_move(user, conn_id, mv, board).await;
            }
        }

        ClientEvent::GameOver {
            session_id,
            winner_id,
            winner_side,
            is_draw,
        } => {
            if let Some(handle) =
                session_handle(state, session_id, conn_id).await
            {
                let _ = handle
                    .game_over(user, conn_id, winner_id, winner_side, is_draw)
                    .await;
            }
        }

        ClientEvent::Forfeit { session_id } => {
            if let Some(handle) =
                session_handle(state, session_id, conn_id).await
            {
                let _ = handle.forfeit(user, conn_id).await;
            }
        }

        ClientEvent::Challenge {
            game_id,
            buddy_id,
            game_title,
        } => {
            let result = state
                .dispatcher
                .dispatch(user, conn_id, game_id, buddy_id, game_title)
                .await;
            match result {
                Ok(session_id) => {
                    tracing::debug!(
                        %user,
                        %session_id,
                        "challenge accepted"
                    );
                }
                Err(SessionError::NotMatched { .. }) => {
                    report(state, conn_id, 403, "not matched with this user");
                }
                Err(SessionError::Store(
                    StoreError::SameParticipants(_),
                )) => {
                    report(state, conn_id, 400, "cannot challenge yourself");
                }
                Err(e) => {
                    tracing::warn!(%user, error = %e, "challenge failed");
                    report(
                        state,
                        conn_id,
                        503,
                        "temporary failure, try again",
                    );
                }
            }
        }

        ClientEvent::Disconnect { reason } => {
            tracing::info!(%user, %reason, "client disconnected");
            return Ok(true);
        }
    }

    Ok(false)
}

/// Resolves a session id to its coordinator. Unknown sessions resolve to
/// `None` silently; infrastructure failures produce a 503 to the caller.
async fn session_handle<S, A, D>(
    state: &Arc<ServerState<S, A, D>>,
    session_id: SessionId,
    conn_id: ConnectionId,
) -> Option<CoordinatorHandle>
where
    S: GameStore,
    A: Authenticator,
    D: PairingDirectory + ProfileLookup + NotificationSink,
{
    match state.router.handle_for(session_id).await {
        Ok(Some(handle)) => Some(handle),
        Ok(None) => {
            tracing::debug!(%session_id, "event for unknown session");
            None
        }
        Err(e) => {
            tracing::warn!(%session_id, error = %e, "router failure");
            report(state, conn_id, 503, "temporary failure, try again");
            None
        }
    }
}

/// Sends an error event through the bus (post-registration path).
fn report<S, A, D>(
    state: &Arc<ServerState<S, A, D>>,
    conn_id: ConnectionId,
    code: u16,
    message: &str,
) where
    S: GameStore,
    A: Authenticator,
    D: PairingDirectory + ProfileLookup + NotificationSink,
{
    let _ = state.bus.send_to(
        conn_id,
        ServerEvent::Error {
            code,
            message: message.to_string(),
        },
    );
}

/// Sends an error directly on the socket, for the pre-registration
/// window during the handshake.
async fn send_direct<S, A, D>(
    conn: &WsConnection,
    state: &Arc<ServerState<S, A, D>>,
    code: u16,
    message: &str,
) where
    S: GameStore,
    A: Authenticator,
    D: PairingDirectory + ProfileLookup + NotificationSink,
{
    let event = ServerEvent::Error {
        code,
        message: message.to_string(),
    };
    if let Ok(bytes) = state.codec.encode(&event) {
        if let Ok(text) = String::from_utf8(bytes) {
            let _ = conn.send(&text).await;
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
