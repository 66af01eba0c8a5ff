//! Sqlite-backed `GameStore`.
//!
//! A single connection behind a mutex; every trait method is a short
//! synchronous critical section, so no guard is ever held across an
//! await point. Finalization runs as one transaction with a guarded
//! status update; the `WHERE status IN (...)` clause is what makes a
//! second termination a no-op at the database level, independent of any
//! in-memory checks upstream.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use gamelink_protocol::{
    GameId, HistoryId, SessionId, SessionStatus, UserId,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::store::{NewSession, SessionOutcome, tally_deltas};
use crate::{GameHistory, GameSession, GameStore, PlayerTally, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS game_sessions (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id          INTEGER NOT NULL,
    player_one       INTEGER NOT NULL,
    player_two       INTEGER NOT NULL,
    current_turn     INTEGER NOT NULL,
    status           TEXT    NOT NULL DEFAULT 'waiting',
    player_one_ready INTEGER NOT NULL DEFAULT 0,
    player_two_ready INTEGER NOT NULL DEFAULT 0,
    state            TEXT,
    winner           INTEGER,
    created_at       TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS game_history (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id          INTEGER NOT NULL UNIQUE
                            REFERENCES game_sessions(id),
    game_id             INTEGER NOT NULL,
    player_one          INTEGER NOT NULL,
    player_two          INTEGER NOT NULL,
    winner              INTEGER,
    player_one_before   INTEGER NOT NULL,
    player_one_after    INTEGER NOT NULL,
    player_two_before   INTEGER NOT NULL,
    player_two_after    INTEGER NOT NULL,
    completed_at        TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS player_tallies (
    user_id      INTEGER PRIMARY KEY,
    rating       INTEGER NOT NULL DEFAULT 1200,
    games_played INTEGER NOT NULL DEFAULT 0,
    games_won    INTEGER NOT NULL DEFAULT 0,
    points       INTEGER NOT NULL DEFAULT 0
);
";

/// A `GameStore` persisted in a sqlite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and runs the
    /// schema migration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// An ephemeral database for tests and demos.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means a panic mid-statement on another thread;
        // sqlite transactions make the data itself safe to keep using.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<GameSession> {
    let status: String = row.get("status")?;
    Ok(GameSession {
        id: SessionId(row.get("id")?),
        game_id: GameId(row.get("game_id")?),
        player_one: UserId(row.get("player_one")?),
        player_two: UserId(row.get("player_two")?),
        current_turn: UserId(row.get("current_turn")?),
        status: SessionStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown session status {status:?}").into(),
            )
        })?,
        player_one_ready: row.get("player_one_ready")?,
        player_two_ready: row.get("player_two_ready")?,
        state: row.get("state")?,
        winner: row
            .get::<_, Option<i64>>("winner")?
            .map(UserId),
        created_at: row.get::<_, DateTime<Utc>>("created_at")?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<GameHistory> {
    Ok(GameHistory {
        id: HistoryId(row.get("id")?),
        session_id: SessionId(row.get("session_id")?),
        game_id: GameId(row.get("game_id")?),
        player_one: UserId(row.get("player_one")?),
        player_two: UserId(row.get("player_two")?),
        winner: row
            .get::<_, Option<i64>>("winner")?
            .map(UserId),
        player_one_rating: gamelink_rating::RatingChange {
            before: row.get("player_one_before")?,
            after: row.get("player_one_after")?,
        },
        player_two_rating: gamelink_rating::RatingChange {
            before: row.get("player_two_before")?,
            after: row.get("player_two_after")?,
        },
        completed_at: row.get::<_, DateTime<Utc>>("completed_at")?,
    })
}

impl GameStore for SqliteStore {
    async fn create_session(
        &self,
        new: NewSession,
    ) -> Result<GameSession, StoreError> {
        if new.player_one == new.player_two {
            return Err(StoreError::SameParticipants(new.player_one));
        }

        let created_at = Utc::now();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO game_sessions
                 (game_id, player_one, player_two, current_turn,
                  status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.game_id.0,
                new.player_one.0,
                new.player_two.0,
                new.player_one.0,
                SessionStatus::Waiting.as_str(),
                created_at,
            ],
        )?;
        let id = SessionId(conn.last_insert_rowid());
        tracing::debug!(session_id = %id, "session created");

        Ok(GameSession {
            id,
            game_id: new.game_id,
            player_one: new.player_one,
            player_two: new.player_two,
            current_turn: new.player_one,
            status: SessionStatus::Waiting,
            player_one_ready: false,
            player_two_ready: false,
            state: None,
            winner: None,
            created_at,
        })
    }

    async fn session(
        &self,
        id: SessionId,
    ) -> Result<Option<GameSession>, StoreError> {
        let conn = self.lock();
        let session = conn
            .query_row(
                "SELECT * FROM game_sessions WHERE id = ?1",
                params![id.0],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    async fn update_readiness(
        &self,
        id: SessionId,
        player_one_ready: bool,
        player_two_ready: bool,
        status: SessionStatus,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE game_sessions
                SET player_one_ready = ?2,
                    player_two_ready = ?3,
                    status = ?4
              WHERE id = ?1",
            params![
                id.0,
                player_one_ready,
                player_two_ready,
                status.as_str()
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn update_state(
        &self,
        id: SessionId,
        state: &str,
        current_turn: UserId,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE game_sessions
                SET state = ?2, current_turn = ?3
              WHERE id = ?1 AND status IN ('waiting', 'active')",
            params![id.0, state, current_turn.0],
        )?;
        if changed == 0 {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM game_sessions WHERE id = ?1)",
                params![id.0],
                |row| row.get(0),
            )?;
            return Err(if exists {
                StoreError::AlreadyTerminal(id)
            } else {
                StoreError::NotFound(id)
            });
        }
        Ok(())
    }

    async fn abandon(&self, id: SessionId) -> Result<(), StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE game_sessions
                SET status = 'abandoned'
              WHERE id = ?1 AND status IN ('waiting', 'active')",
            params![id.0],
        )?;
        if changed == 0 {
            // Distinguish a missing row from an already-ended one.
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM game_sessions WHERE id = ?1)",
                params![id.0],
                |row| row.get(0),
            )?;
            return Err(if exists {
                StoreError::AlreadyTerminal(id)
            } else {
                StoreError::NotFound(id)
            });
        }
        Ok(())
    }

    async fn finalize(
        &self,
        outcome: SessionOutcome,
    ) -> Result<GameHistory, StoreError> {
        let id = outcome.session_id;
        let completed_at = Utc::now();

        let mut conn = self.lock();
        let tx = conn.transaction()?;

        // The guard clause is the entire exactly-once story: only a
        // non-terminal row can flip to completed, and the ledger append
        // plus tally updates ride the same transaction.
        let changed = tx.execute(
            "UPDATE game_sessions
                SET status = 'completed', winner = ?2
              WHERE id = ?1 AND status IN ('waiting', 'active')",
            params![id.0, outcome.winner.map(|u| u.0)],
        )?;
        if changed == 0 {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM game_sessions WHERE id = ?1)",
                params![id.0],
                |row| row.get(0),
            )?;
            return Err(if exists {
                StoreError::AlreadyTerminal(id)
            } else {
                StoreError::NotFound(id)
            });
        }

        let (game_id, player_one, player_two) = tx.query_row(
            "SELECT game_id, player_one, player_two
               FROM game_sessions WHERE id = ?1",
            params![id.0],
            |row| {
                Ok((
                    GameId(row.get(0)?),
                    UserId(row.get(1)?),
                    UserId(row.get(2)?),
                ))
            },
        )?;

        tx.execute(
            "INSERT INTO game_history
                 (session_id, game_id, player_one, player_two, winner,
                  player_one_before, player_one_after,
                  player_two_before, player_two_after, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id.0,
                game_id.0,
                player_one.0,
                player_two.0,
                outcome.winner.map(|u| u.0),
                outcome.player_one.before,
                outcome.player_one.after,
                outcome.player_two.before,
                outcome.player_two.after,
                completed_at,
            ],
        )?;
        let history_id = HistoryId(tx.last_insert_rowid());

        for (user, rating, won, points) in
            tally_deltas(&outcome, player_one, player_two)
        {
            tx.execute(
                "INSERT INTO player_tallies
                     (user_id, rating, games_played, games_won, points)
                 VALUES (?1, ?2, 1, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                     rating = ?2,
                     games_played = games_played + 1,
                     games_won = games_won + ?3,
                     points = points + ?4",
                params![user.0, rating.after, won as i32, points],
            )?;
        }

        tx.commit()?;
        tracing::info!(
            session_id = %id,
            winner = ?outcome.winner,
            "session finalized"
        );

        Ok(GameHistory {
            id: history_id,
            session_id: id,
            game_id,
            player_one,
            player_two,
            winner: outcome.winner,
            player_one_rating: outcome.player_one,
            player_two_rating: outcome.player_two,
            completed_at,
        })
    }

    async fn session_history(
        &self,
        id: SessionId,
    ) -> Result<Option<GameHistory>, StoreError> {
        let conn = self.lock();
        let history = conn
            .query_row(
                "SELECT * FROM game_history WHERE session_id = ?1",
                params![id.0],
                history_from_row,
            )
            .optional()?;
        Ok(history)
    }

    async fn tally(&self, user: UserId) -> Result<PlayerTally, StoreError> {
        let conn = self.lock();
        let tally = conn
            .query_row(
                "SELECT rating, games_played, games_won, points
                   FROM player_tallies WHERE user_id = ?1",
                params![user.0],
                |row| {
                    Ok(PlayerTally {
                        user_id: user,
                        rating: row.get(0)?,
                        games_played: row.get(1)?,
                        games_won: row.get(2)?,
                        points: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(tally.unwrap_or_else(|| PlayerTally::fresh(user)))
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gamelink_rating::RatingChange;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn new_session() -> NewSession {
        NewSession {
            game_id: GameId(3),
            player_one: UserId(1),
            player_two: UserId(2),
        }
    }

    fn win_for(id: SessionId, winner: UserId) -> SessionOutcome {
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
    async fn test_create_and_fetch_round_trips_all_columns() {
        let store = store();
        let created = store.create_session(new_session()).await.unwrap();
        let fetched = store.session(created.id).await.unwrap().unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.status, SessionStatus::Waiting);
        assert_eq!(fetched.current_turn, UserId(1));
    }

    #[tokio::test]
    async fn test_update_readiness_persists_flags_and_status() {
        let store = store();
        let s = store.create_session(new_session()).await.unwrap();
        store
            .update_readiness(s.id, true, true, SessionStatus::Active)
            .await
            .unwrap();

        let fetched = store.session(s.id).await.unwrap().unwrap();
        assert!(fetched.player_one_ready);
        assert!(fetched.player_two_ready);
        assert_eq!(fetched.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_update_state_unknown_session_is_not_found() {
        let store = store();
        assert!(matches!(
            store.update_state(SessionId(404), "x", UserId(1)).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_state_terminal_session_rejected() {
        let store = store();
        let s = store.create_session(new_session()).await.unwrap();
        store.update_state(s.id, "final", UserId(2)).await.unwrap();
        store.finalize(win_for(s.id, UserId(1))).await.unwrap();

        let result = store.update_state(s.id, "stray", UserId(1)).await;
        assert!(matches!(
            result,
            Err(StoreError::AlreadyTerminal(id)) if id == s.id
        ));
        let fetched = store.session(s.id).await.unwrap().unwrap();
        assert_eq!(fetched.state.as_deref(), Some("final"));
    }

    #[tokio::test]
    async fn test_finalize_is_transactional_and_exactly_once() {
        let store = store();
        let s = store.create_session(new_session()).await.unwrap();

        let history = store.finalize(win_for(s.id, UserId(2))).await.unwrap();
        assert_eq!(history.winner, Some(UserId(2)));

        // Replay with a contradictory winner must be refused wholesale.
        assert!(matches!(
            store.finalize(win_for(s.id, UserId(1))).await,
            Err(StoreError::AlreadyTerminal(_))
        ));

        let fetched = store.session(s.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, SessionStatus::Completed);
        assert_eq!(fetched.winner, Some(UserId(2)));

        let stored = store.session_history(s.id).await.unwrap().unwrap();
        assert_eq!(stored.winner, Some(UserId(2)));
        assert_eq!(stored.player_one_rating.after, 1216);

        let winner = store.tally(UserId(2)).await.unwrap();
        assert_eq!(winner.games_played, 1);
        assert_eq!(winner.games_won, 1);
        assert_eq!(winner.points, crate::POINTS_WIN);
        assert_eq!(winner.rating, 1184);
    }

    #[tokio::test]
    async fn test_finalize_accumulates_tallies_across_sessions() {
        let store = store();
        let a = store.create_session(new_session()).await.unwrap();
        let b = store.create_session(new_session()).await.unwrap();
        store.finalize(win_for(a.id, UserId(1))).await.unwrap();
        store
            .finalize(SessionOutcome {
                session_id: b.id,
                winner: Some(UserId(1)),
                player_one: RatingChange {
                    before: 1216,
                    after: 1230,
                },
                player_two: RatingChange {
                    before: 1184,
                    after: 1170,
                },
            })
            .await
            .unwrap();

        let tally = store.tally(UserId(1)).await.unwrap();
        assert_eq!(tally.games_played, 2);
        assert_eq!(tally.games_won, 2);
        assert_eq!(tally.points, 2 * crate::POINTS_WIN);
        assert_eq!(tally.rating, 1230, "rating is latest, not summed");
    }

    #[tokio::test]
    async fn test_abandon_then_finalize_rejected() {
        let store = store();
        let s = store.create_session(new_session()).await.unwrap();
        store.abandon(s.id).await.unwrap();
        assert!(matches!(
            store.finalize(win_for(s.id, UserId(1))).await,
            Err(StoreError::AlreadyTerminal(_))
        ));
        assert!(store.session_history(s.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finalize_unknown_session_is_not_found() {
        let store = store();
        assert!(matches!(
            store.finalize(win_for(SessionId(777), UserId(1))).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_tally_unknown_user_defaults() {
        let store = store();
        let tally = store.tally(UserId(9)).await.unwrap();
        assert_eq!(tally.rating, 1200);
        assert_eq!(tally.points, 0);
    }
}
