//! Platform collaborator seams.
//!
//! The session layer runs inside a larger matching platform that owns
//! user accounts, the buddy graph, and the notification feed. These
//! traits are the session layer's view of that platform; the demo and
//! the tests use [`MemoryDirectory`], real deployments implement them
//! against their own storage.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;

use gamelink_protocol::{SessionId, UserId};

use crate::SessionError;

/// Answers "may these two users play each other?".
///
/// Challenges are only valid between matched buddies; this is the seam
/// the dispatcher asks.
pub trait PairingDirectory: Send + Sync + 'static {
    fn are_paired(
        &self,
        a: UserId,
        b: UserId,
    ) -> impl Future<Output = Result<bool, SessionError>> + Send;
}

/// Resolves a user id to a human-readable display name.
///
/// Used wherever an event carries a name instead of an id (forfeit
/// notices, challenge pushes).
pub trait ProfileLookup: Send + Sync + 'static {
    fn display_name(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<String, SessionError>> + Send;
}

/// A durable challenge notification, written before the realtime push so
/// an offline invitee still finds the invitation later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeNotice {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub message: String,
}

/// Receives durable notifications.
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(
        &self,
        notice: ChallengeNotice,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DirectoryState {
    names: HashMap<UserId, String>,
    pairs: HashSet<(UserId, UserId)>,
    notices: Vec<ChallengeNotice>,
}

/// An in-process directory for tests and demos. Implements all three
/// collaborator traits.
#[derive(Default)]
pub struct MemoryDirectory {
    state: Mutex<DirectoryState>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: UserId, name: &str) {
        self.lock().names.insert(user, name.to_string());
    }

    /// Records a match in both directions.
    pub fn pair(&self, a: UserId, b: UserId) {
        let mut state = self.lock();
        state.pairs.insert((a, b));
        state.pairs.insert((b, a));
    }

    /// Durable notices recorded so far, oldest first.
    pub fn notices(&self) -> Vec<ChallengeNotice> {
        self.lock().notices.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PairingDirectory for MemoryDirectory {
    async fn are_paired(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<bool, SessionError> {
        Ok(self.lock().pairs.contains(&(a, b)))
    }
}

impl ProfileLookup for MemoryDirectory {
    async fn display_name(
        &self,
        user: UserId,
    ) -> Result<String, SessionError> {
        Ok(self
            .lock()
            .names
            .get(&user)
            .cloned()
            .unwrap_or_else(|| format!("User {}", user.0)))
    }
}

impl NotificationSink for MemoryDirectory {
    async fn notify(
        &self,
        notice: ChallengeNotice,
    ) -> Result<(), SessionError> {
        self.lock().notices.push(notice);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pairing_is_symmetric() {
        let dir = MemoryDirectory::new();
        dir.pair(UserId(1), UserId(2));
        assert!(dir.are_paired(UserId(1), UserId(2)).await.unwrap());
        assert!(dir.are_paired(UserId(2), UserId(1)).await.unwrap());
        assert!(!dir.are_paired(UserId(1), UserId(3)).await.unwrap());
    }

    #[tokio::test]
    async fn test_display_name_falls_back_to_id() {
        let dir = MemoryDirectory::new();
        dir.add_user(UserId(1), "Mei Lin");
        assert_eq!(
            dir.display_name(UserId(1)).await.unwrap(),
            "Mei Lin"
        );
        assert_eq!(dir.display_name(UserId(9)).await.unwrap(), "User 9");
    }
}
