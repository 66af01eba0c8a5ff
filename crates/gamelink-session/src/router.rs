//! Routes session ids to live coordinator tasks.

use std::collections::HashMap;
use std::sync::Arc;

use gamelink_bus::RealtimeBus;
use gamelink_protocol::SessionId;
use gamelink_store::{GameSession, GameStore, NewSession};
use tokio::sync::Mutex;

use crate::coordinator::{CoordinatorHandle, spawn_session};
use crate::{CoordinatorConfig, ProfileLookup, SessionError};

/// Lazily spawns and tracks one coordinator per session.
///
/// A session's actor is spawned on first touch, loading the row from the
/// store; so a session created weeks ago resumes transparently after a
/// server restart. Terminal sessions get actors too: a reconnecting
/// client still needs its `join` snapshot to render the finished board.
pub struct SessionRouter<S, P> {
    store: Arc<S>,
    bus: Arc<RealtimeBus>,
    profiles: Arc<P>,
    config: CoordinatorConfig,
    sessions: Mutex<HashMap<SessionId, CoordinatorHandle>>,
}

impl<S: GameStore, P: ProfileLookup> SessionRouter<S, P> {
    pub fn new(
        store: Arc<S>,
        bus: Arc<RealtimeBus>,
        profiles: Arc<P>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            bus,
            profiles,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn bus(&self) -> &Arc<RealtimeBus> {
        &self.bus
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the coordinator for a session, spawning it from the store
    /// if needed. `Ok(None)` means no such session exists; callers
    /// stay silent in that case rather than leaking existence.
    pub async fn handle_for(
        &self,
        id: SessionId,
    ) -> Result<Option<CoordinatorHandle>, SessionError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(handle) = sessions.get(&id) {
            if !handle.is_closed() {
                return Ok(Some(handle.clone()));
            }
            sessions.remove(&id);
        }

        let loaded = tokio::time::timeout(
            self.config.store_timeout,
            self.store.session(id),
        )
        .await
        .map_err(|_| SessionError::StoreTimeout)??;
        let Some(session) = loaded else {
            return Ok(None);
        };

        let handle = self.spawn(session);
        sessions.insert(id, handle.clone());
        Ok(Some(handle))
    }

    /// Creates a session row and its coordinator in one step. Used by
    /// the challenge dispatcher.
    pub async fn open(
        &self,
        new: NewSession,
    ) -> Result<(GameSession, CoordinatorHandle), SessionError> {
        let session = tokio::time::timeout(
            self.config.store_timeout,
            self.store.create_session(new),
        )
        .await
        .map_err(|_| SessionError::StoreTimeout)??;

        let handle = self.spawn(session.clone());
        self.sessions
            .lock()
            .await
            .insert(session.id, handle.clone());
        Ok((session, handle))
    }

    /// Number of live coordinators.
    pub async fn live_sessions(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, handle| !handle.is_closed());
        sessions.len()
    }

    /// Stops every coordinator. Store state is untouched; the sessions
    /// respawn on next touch.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().map(|(_, h)| h).collect()
        };
        for handle in handles {
            let _ = handle.shutdown().await;
        }
    }

    fn spawn(&self, session: GameSession) -> CoordinatorHandle {
        spawn_session(
            session,
            Arc::clone(&self.store),
            Arc::clone(&self.bus),
            Arc::clone(&self.profiles),
            self.config,
        )
    }
}
