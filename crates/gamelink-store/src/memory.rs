//! In-memory `GameStore` implementation.
//!
//! Keeps every table in a `HashMap` behind one async mutex. Used by the
//! coordinator's tests and the demo server; it honors the same contracts
//! as the sqlite store (terminal guard, atomic finalization, trivially
//! atomic here because the whole store is one critical section).

use std::collections::HashMap;

use chrono::Utc;
use gamelink_protocol::{HistoryId, SessionId, SessionStatus, UserId};
use tokio::sync::Mutex;

use crate::store::{NewSession, SessionOutcome, tally_deltas};
use crate::{
    GameHistory, GameSession, GameStore, PlayerTally, StoreError,
};

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, GameSession>,
    histories: HashMap<SessionId, GameHistory>,
    tallies: HashMap<UserId, PlayerTally>,
    next_session_id: i64,
    next_history_id: i64,
}

/// A `GameStore` backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user's tally; handy for tests that need non-default
    /// ratings.
    pub async fn seed_tally(&self, tally: PlayerTally) {
        self.inner.lock().await.tallies.insert(tally.user_id, tally);
    }
}

impl GameStore for MemoryStore {
    async fn create_session(
        &self,
        new: NewSession,
    ) -> Result<GameSession, StoreError> {
        if new.player_one == new.player_two {
            return Err(StoreError::SameParticipants(new.player_one));
        }

        let mut inner = self.inner.lock().await;
        inner.next_session_id += 1;
        let session = GameSession {
            id: SessionId(inner.next_session_id),
            game_id: new.game_id,
            player_one: new.player_one,
            player_two: new.player_two,
            current_turn: new.player_one,
            status: SessionStatus::Waiting,
            player_one_ready: false,
            player_two_ready: false,
            state: None,
            winner: None,
            created_at: Utc::now(),
        };
        inner.sessions.insert(session.id, session.clone());
        tracing::debug!(session_id = %session.id, "session created");
        Ok(session)
    }

    async fn session(
        &self,
        id: SessionId,
    ) -> Result<Option<GameSession>, StoreError> {
        Ok(self.inner.lock().await.sessions.get(&id).cloned())
    }

    async fn update_readiness(
        &self,
        id: SessionId,
        player_one_ready: bool,
        player_two_ready: bool,
        status: SessionStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let session = inner
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        session.player_one_ready = player_one_ready;
        session.player_two_ready = player_two_ready;
        session.status = status;
        Ok(())
    }

    async fn update_state(
        &self,
        id: SessionId,
        state: &str,
        current_turn: UserId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let session = inner
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        if session.status.is_terminal() {
            return Err(StoreError::AlreadyTerminal(id));
        }
        session.state = Some(state.to_string());
        session.current_turn = current_turn;
        Ok(())
    }

    async fn abandon(&self, id: SessionId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let session = inner
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        if session.status.is_terminal() {
            return Err(StoreError::AlreadyTerminal(id));
        }
        session.status = SessionStatus::Abandoned;
        Ok(())
    }

    async fn finalize(
        &self,
        outcome: SessionOutcome,
    ) -> Result<GameHistory, StoreError> {
        // One lock scope covers the status flip, the ledger append, and
        // both tally updates, so readers never see partial state.
        let mut inner = self.inner.lock().await;

        let session = inner
            .sessions
            .get_mut(&outcome.session_id)
            .ok_or(StoreError::NotFound(outcome.session_id))?;
        if session.status.is_terminal() {
            return Err(StoreError::AlreadyTerminal(outcome.session_id));
        }
        session.status = SessionStatus::Completed;
        session.winner = outcome.winner;
        let (game_id, player_one, player_two) =
            (session.game_id, session.player_one, session.player_two);

        inner.next_history_id += 1;
        let history = GameHistory {
            id: HistoryId(inner.next_history_id),
            session_id: outcome.session_id,
            game_id,
            player_one,
            player_two,
            winner: outcome.winner,
            player_one_rating: outcome.player_one,
            player_two_rating: outcome.player_two,
            completed_at: Utc::now(),
        };
        inner.histories.insert(outcome.session_id, history.clone());

        for (user, rating, won, points) in
            tally_deltas(&outcome, player_one, player_two)
        {
            let tally = inner
                .tallies
                .entry(user)
                .or_insert_with(|| PlayerTally::fresh(user));
            tally.rating = rating.after;
            tally.games_played += 1;
            if won {
                tally.games_won += 1;
            }
            tally.points += points;
        }

        tracing::info!(
            session_id = %outcome.session_id,
            winner = ?outcome.winner,
            "session finalized"
        );
        Ok(history)
    }

    async fn session_history(
        &self,
        id: SessionId,
    ) -> Result<Option<GameHistory>, StoreError> {
        Ok(self.inner.lock().await.histories.get(&id).cloned())
    }

    async fn tally(&self, user: UserId) -> Result<PlayerTally, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .tallies
            .get(&user)
            .copied()
            .unwrap_or_else(|| PlayerTally::fresh(user)))
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gamelink_protocol::GameId;
    use gamelink_rating::RatingChange;

    fn new_session() -> NewSession {
        NewSession {
            game_id: GameId(1),
            player_one: UserId(10),
            player_two: UserId(20),
        }
    }

    fn win_for(
        id: SessionId,
        winner: UserId,
    ) -> SessionOutcome {
        SessionOutcome {
            session_id: id,
            winner: Some(winner),
            player_one: RatingChange {
                before: 1200,
                after: 1216,
            },
            player_two: RatingChange {
                before: 1200,
                after: 1184,
            },
        }
    }

    #[tokio::test]
    async fn test_create_session_starts_waiting_with_challenger_turn() {
        let store = MemoryStore::new();
        let s = store.create_session(new_session()).await.unwrap();
        assert_eq!(s.status, SessionStatus::Waiting);
        assert_eq!(s.current_turn, UserId(10));
        assert!(!s.player_one_ready);
        assert!(!s.player_two_ready);
        assert!(s.state.is_none());
    }

    #[tokio::test]
    async fn test_create_session_rejects_same_participants() {
        let store = MemoryStore::new();
        let result = store
            .create_session(NewSession {
                game_id: GameId(1),
                player_one: UserId(5),
                player_two: UserId(5),
            })
            .await;
        assert!(matches!(
            result,
            Err(StoreError::SameParticipants(u)) if u == UserId(5)
        ));
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let store = MemoryStore::new();
        let a = store.create_session(new_session()).await.unwrap();
        let b = store.create_session(new_session()).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_session_unknown_id_returns_none() {
        let store = MemoryStore::new();
        assert!(store.session(SessionId(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_state_overwrites_blob() {
        let store = MemoryStore::new();
        let s = store.create_session(new_session()).await.unwrap();
        store.update_state(s.id, "e4", UserId(20)).await.unwrap();
        store.update_state(s.id, "e4 e5", UserId(10)).await.unwrap();

        let fetched = store.session(s.id).await.unwrap().unwrap();
        assert_eq!(fetched.state.as_deref(), Some("e4 e5"));
        assert_eq!(fetched.current_turn, UserId(10));
    }

    #[tokio::test]
    async fn test_update_state_terminal_session_rejected() {
        let store = MemoryStore::new();
        let s = store.create_session(new_session()).await.unwrap();
        store.update_state(s.id, "final", UserId(20)).await.unwrap();
        store.finalize(win_for(s.id, UserId(10))).await.unwrap();

        let result = store.update_state(s.id, "stray", UserId(10)).await;
        assert!(matches!(
            result,
            Err(StoreError::AlreadyTerminal(id)) if id == s.id
        ));
        let fetched = store.session(s.id).await.unwrap().unwrap();
        assert_eq!(fetched.state.as_deref(), Some("final"));
    }

    #[tokio::test]
    async fn test_finalize_writes_history_and_tallies() {
        let store = MemoryStore::new();
        let s = store.create_session(new_session()).await.unwrap();

        let history =
            store.finalize(win_for(s.id, UserId(10))).await.unwrap();
        assert_eq!(history.winner, Some(UserId(10)));
        assert_eq!(history.player_one_rating.after, 1216);

        let fetched = store.session(s.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, SessionStatus::Completed);
        assert_eq!(fetched.winner, Some(UserId(10)));

        let winner = store.tally(UserId(10)).await.unwrap();
        assert_eq!(winner.rating, 1216);
        assert_eq!(winner.games_played, 1);
        assert_eq!(winner.games_won, 1);
        assert_eq!(winner.points, crate::POINTS_WIN);

        let loser = store.tally(UserId(20)).await.unwrap();
        assert_eq!(loser.rating, 1184);
        assert_eq!(loser.games_played, 1);
        assert_eq!(loser.games_won, 0);
        assert_eq!(loser.points, crate::POINTS_LOSS);
    }

    #[tokio::test]
    async fn test_finalize_twice_rejects_and_keeps_one_ledger_row() {
        let store = MemoryStore::new();
        let s = store.create_session(new_session()).await.unwrap();
        store.finalize(win_for(s.id, UserId(10))).await.unwrap();

        // Second termination, even with a different winner, must change
        // nothing.
        let result = store.finalize(win_for(s.id, UserId(20))).await;
        assert!(matches!(
            result,
            Err(StoreError::AlreadyTerminal(id)) if id == s.id
        ));

        let fetched = store.session(s.id).await.unwrap().unwrap();
        assert_eq!(fetched.winner, Some(UserId(10)));
        let history = store.session_history(s.id).await.unwrap().unwrap();
        assert_eq!(history.winner, Some(UserId(10)));
        let tally = store.tally(UserId(10)).await.unwrap();
        assert_eq!(tally.games_played, 1, "no double-scoring");
    }

    #[tokio::test]
    async fn test_finalize_draw_awards_draw_points() {
        let store = MemoryStore::new();
        let s = store.create_session(new_session()).await.unwrap();
        store
            .finalize(SessionOutcome {
                session_id: s.id,
                winner: None,
                player_one: RatingChange {
                    before: 1200,
                    after: 1200,
                },
                player_two: RatingChange {
                    before: 1200,
                    after: 1200,
                },
            })
            .await
            .unwrap();

        for user in [UserId(10), UserId(20)] {
            let tally = store.tally(user).await.unwrap();
            assert_eq!(tally.points, crate::POINTS_DRAW);
            assert_eq!(tally.games_won, 0);
            assert_eq!(tally.rating, 1200);
        }
    }

    #[tokio::test]
    async fn test_abandon_waiting_session_has_no_ledger_row() {
        let store = MemoryStore::new();
        let s = store.create_session(new_session()).await.unwrap();
        store.abandon(s.id).await.unwrap();

        let fetched = store.session(s.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, SessionStatus::Abandoned);
        assert!(store.session_history(s.id).await.unwrap().is_none());
        // Ratings untouched.
        assert_eq!(store.tally(UserId(10)).await.unwrap().games_played, 0);
    }

    #[tokio::test]
    async fn test_abandon_terminal_session_rejected() {
        let store = MemoryStore::new();
        let s = store.create_session(new_session()).await.unwrap();
        store.abandon(s.id).await.unwrap();
        assert!(matches!(
            store.abandon(s.id).await,
            Err(StoreError::AlreadyTerminal(_))
        ));
    }

    #[tokio::test]
    async fn test_tally_unknown_user_is_fresh_default() {
        let store = MemoryStore::new();
        let tally = store.tally(UserId(42)).await.unwrap();
        assert_eq!(tally.rating, 1200);
        assert_eq!(tally.games_played, 0);
    }
}
