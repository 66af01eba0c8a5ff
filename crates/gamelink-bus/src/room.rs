//! The room registry: which connection hears which events.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;

use gamelink_protocol::{ServerEvent, SessionId, UserId};
use tokio::sync::mpsc::UnboundedSender;

use crate::{BusError, ConnectionId};

/// A broadcast scope.
///
/// Game rooms carry the in-session traffic (readiness, moves, results);
/// user rooms exist so a specific person can be reached on every
/// connection they hold; challenge invitations go there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    /// Both participants of one session.
    Game(SessionId),
    /// All live connections of one user.
    User(UserId),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Game(id) => write!(f, "game:{}", id.0),
            Room::User(id) => write!(f, "user:{}", id.0),
        }
    }
}

#[derive(Default)]
struct Registry {
    /// Room -> subscriber set, with each subscriber's outbound sender.
    rooms: HashMap<Room, HashMap<ConnectionId, UnboundedSender<ServerEvent>>>,
    /// Every registered connection, for direct sends.
    conns: HashMap<ConnectionId, UnboundedSender<ServerEvent>>,
    /// Reverse index so dropping a connection is O(its rooms).
    memberships: HashMap<ConnectionId, HashSet<Room>>,
}

/// Room-scoped event fan-out.
///
/// All operations are short synchronous critical sections; the senders
/// are unbounded channels, so `broadcast` never blocks on a slow client;
/// the connection's own writer task drains its queue.
#[derive(Default)]
pub struct RealtimeBus {
    registry: Mutex<Registry>,
}

impl RealtimeBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a connection's outbound sender. Must happen before any
    /// subscribe or direct send for that connection.
    pub fn register(
        &self,
        conn: ConnectionId,
        sender: UnboundedSender<ServerEvent>,
    ) {
        let mut reg = self.lock();
        reg.conns.insert(conn, sender);
        reg.memberships.entry(conn).or_default();
        tracing::debug!(%conn, "connection registered");
    }

    /// Adds a connection to a room. Subscribing twice is a no-op.
    pub fn subscribe(
        &self,
        room: Room,
        conn: ConnectionId,
    ) -> Result<(), BusError> {
        let mut reg = self.lock();
        let sender = reg
            .conns
            .get(&conn)
            .cloned()
            .ok_or(BusError::UnknownConnection(conn))?;
        reg.rooms.entry(room).or_default().insert(conn, sender);
        reg.memberships.entry(conn).or_default().insert(room);
        tracing::debug!(%conn, %room, "subscribed");
        Ok(())
    }

    /// Removes a connection from a room; empty rooms are pruned.
    pub fn unsubscribe(&self, room: Room, conn: ConnectionId) {
        let mut reg = self.lock();
        if let Some(members) = reg.rooms.get_mut(&room) {
            members.remove(&conn);
            if members.is_empty() {
                reg.rooms.remove(&room);
            }
        }
        if let Some(rooms) = reg.memberships.get_mut(&conn) {
            rooms.remove(&room);
        }
    }

    /// Delivers an event to every subscriber of `room`, skipping
    /// `except` (the originating connection, which already applied the
    /// action locally). Returns how many subscribers were reached.
    ///
    /// Senders whose receiving task has gone away are skipped; the
    /// connection's own teardown removes them from the registry.
    pub fn broadcast(
        &self,
        room: Room,
        event: &ServerEvent,
        except: Option<ConnectionId>,
    ) -> usize {
        let reg = self.lock();
        let Some(members) = reg.rooms.get(&room) else {
            tracing::trace!(%room, "broadcast to empty room");
            return 0;
        };

        let mut delivered = 0;
        for (conn, sender) in members {
            if Some(*conn) == except {
                continue;
            }
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Delivers an event to one specific connection.
    pub fn send_to(
        &self,
        conn: ConnectionId,
        event: ServerEvent,
    ) -> Result<(), BusError> {
        let reg = self.lock();
        let sender = reg
            .conns
            .get(&conn)
            .ok_or(BusError::UnknownConnection(conn))?;
        sender
            .send(event)
            .map_err(|_| BusError::UnknownConnection(conn))
    }

    /// Tears down a connection: unregisters it and leaves every room it
    /// was in. Safe to call more than once.
    pub fn drop_connection(&self, conn: ConnectionId) {
        let mut reg = self.lock();
        reg.conns.remove(&conn);
        let rooms = reg.memberships.remove(&conn).unwrap_or_default();
        for room in rooms {
            if let Some(members) = reg.rooms.get_mut(&room) {
                members.remove(&conn);
                if members.is_empty() {
                    reg.rooms.remove(&room);
                }
            }
        }
        tracing::debug!(%conn, "connection dropped");
    }

    /// Number of subscribers currently in a room.
    pub fn room_size(&self, room: Room) -> usize {
        self.lock().rooms.get(&room).map_or(0, HashMap::len)
    }
}

// =========================================================================
// Tests
// =========================================================================
