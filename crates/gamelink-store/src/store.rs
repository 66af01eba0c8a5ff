//! The `GameStore` trait: the persistence seam of the core.
//!
//! The coordinator owns all session mutation logic; the store's job is to
//! make each mutation durable and to make termination atomic. Two
//! implementations ship with the crate ([`MemoryStore`](crate::MemoryStore)
//! and [`SqliteStore`](crate::SqliteStore)); platforms with their own
//! relational store implement this trait against it.

use std::future::Future;

use gamelink_protocol::{GameId, SessionId, SessionStatus, UserId};
use gamelink_rating::RatingChange;

use crate::{GameHistory, GameSession, PlayerTally, StoreError};

/// Points awarded toward the platform's engagement counters, per game.
pub const POINTS_WIN: i32 = 10;
/// Both participants earn this on a draw.
pub const POINTS_DRAW: i32 = 5;
/// Showing up still counts for something.
pub const POINTS_LOSS: i32 = 2;

/// Everything needed to create a session row.
///
/// The challenger sits in seat one and holds the opening turn; the row is
/// created in `Waiting` with both ready flags down.
#[derive(Debug, Clone, Copy)]
pub struct NewSession {
    pub game_id: GameId,
    pub player_one: UserId,
    pub player_two: UserId,
}

/// The scored result of a session, handed to [`GameStore::finalize`].
///
/// Ratings come pre-computed (the engine is pure and runs in the
/// coordinator); the store's responsibility is writing them atomically
/// with the status flip and the ledger append.
#[derive(Debug, Clone, Copy)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    /// `None` records a draw.
    pub winner: Option<UserId>,
    pub player_one: RatingChange,
    pub player_two: RatingChange,
}

/// Durable storage for sessions, the history ledger, and player tallies.
///
/// All methods return futures so implementations are free to do real I/O;
/// callers bound them with timeouts; a store call must never hang a
/// session forever.
pub trait GameStore: Send + Sync + 'static {
    /// Creates a new `Waiting` session.
    ///
    /// # Errors
    /// [`StoreError::SameParticipants`] if the two seats name one user.
    fn create_session(
        &self,
        new: NewSession,
    ) -> impl Future<Output = Result<GameSession, StoreError>> + Send;

    /// Fetches a session row. `Ok(None)` for unknown ids; plain
    /// not-found is an ordinary variant here, not an error.
    fn session(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<Option<GameSession>, StoreError>> + Send;

    /// Persists the ready flags and (possibly promoted) status.
    fn update_readiness(
        &self,
        id: SessionId,
        player_one_ready: bool,
        player_two_ready: bool,
        status: SessionStatus,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrites the opaque state blob (last-writer-wins) and the
    /// client-reported turn holder.
    fn update_state(
        &self,
        id: SessionId,
        state: &str,
        current_turn: UserId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Marks a never-started session `Abandoned`. No rating impact, no
    /// ledger row.
    ///
    /// # Errors
    /// [`StoreError::AlreadyTerminal`] if the session already ended.
    fn abandon(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Terminates and scores a session: flips the status to `Completed`,
    /// records the winner, appends the ledger row, and applies both
    /// rating/tally updates; one atomic unit. Either everything is
    /// durable or nothing is.
    ///
    /// # Errors
    /// - [`StoreError::AlreadyTerminal`]: the idempotence backstop; a
    ///   second termination must change nothing and append nothing.
    /// - [`StoreError::NotFound`]: unknown session.
    fn finalize(
        &self,
        outcome: SessionOutcome,
    ) -> impl Future<Output = Result<GameHistory, StoreError>> + Send;

    /// The ledger row for a session, if it was scored.
    fn session_history(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<Option<GameHistory>, StoreError>> + Send;

    /// A user's rating and counters; a fresh default tally for users who
    /// never played.
    fn tally(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<PlayerTally, StoreError>> + Send;
}

/// Splits an outcome into per-seat (won, points) pairs.
///
/// Shared by both store implementations so the schedule can't drift
/// between them.
pub(crate) fn tally_deltas(
    outcome: &SessionOutcome,
    player_one: UserId,
    player_two: UserId,
) -> [(UserId, RatingChange, bool, i32); 2] {
    let award = |user: UserId| match outcome.winner {
        Some(w) if w == user => (true, POINTS_WIN),
        Some(_) => (false, POINTS_LOSS),
        None => (false, POINTS_DRAW),
    };
    let (one_won, one_points) = award(player_one);
    let (two_won, two_points) = award(player_two);
    [
        (player_one, outcome.player_one, one_won, one_points),
        (player_two, outcome.player_two, two_won, two_points),
    ]
}
