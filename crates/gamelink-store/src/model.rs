//! Domain model: session rows, ledger rows, and per-user tallies.

use chrono::{DateTime, Utc};
use gamelink_protocol::{
    GameId, HistoryId, SessionId, SessionSnapshot, SessionStatus, UserId,
};
use gamelink_rating::RatingChange;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ParticipantRole
// ---------------------------------------------------------------------------

/// Which seat, if any, a user occupies in a session.
///
/// Every handler resolves the caller through [`GameSession::role_of`]
/// instead of comparing raw ids inline; `Neither` is an ordinary value
/// that handlers turn into a quiet no-op, not an error the caller can use
/// to probe session membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantRole {
    PlayerOne,
    PlayerTwo,
    Neither,
}

// ---------------------------------------------------------------------------
// GameSession
// ---------------------------------------------------------------------------

/// One instance of two users playing one game.
///
/// Invariants (enforced at creation and by the status machine):
/// - the two participant ids are distinct
/// - `status` only moves forward; terminal states are absorbing
/// - `winner`, when present, is one of the two participants
/// - `state` is last-writer-wins: the store never merges blobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub game_id: GameId,
    pub player_one: UserId,
    pub player_two: UserId,
    /// Whose turn the clients last agreed on. Seeded with the challenger;
    /// the core relays but does not enforce turn order.
    pub current_turn: UserId,
    pub status: SessionStatus,
    pub player_one_ready: bool,
    pub player_two_ready: bool,
    /// Opaque board/move blob supplied by trusted clients.
    pub state: Option<String>,
    pub winner: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl GameSession {
    /// Resolves which seat `user` occupies.
    pub fn role_of(&self, user: UserId) -> ParticipantRole {
        if user == self.player_one {
            ParticipantRole::PlayerOne
        } else if user == self.player_two {
            ParticipantRole::PlayerTwo
        } else {
            ParticipantRole::Neither
        }
    }

    /// The other participant, if `user` is one of the two.
    pub fn opponent_of(&self, user: UserId) -> Option<UserId> {
        match self.role_of(user) {
            ParticipantRole::PlayerOne => Some(self.player_two),
            ParticipantRole::PlayerTwo => Some(self.player_one),
            ParticipantRole::Neither => None,
        }
    }

    /// `true` once both participants acknowledged readiness.
    pub fn both_ready(&self) -> bool {
        self.player_one_ready && self.player_two_ready
    }

    /// The private view sent in reply to `join`.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            game_id: self.game_id,
            status: self.status,
            player_one: self.player_one,
            player_two: self.player_two,
            player_one_ready: self.player_one_ready,
            player_two_ready: self.player_two_ready,
            current_turn: self.current_turn,
            state: self.state.clone(),
            winner: self.winner,
        }
    }
}

// ---------------------------------------------------------------------------
// GameHistory
// ---------------------------------------------------------------------------

/// Immutable ledger row for one scored session.
///
/// Created exactly once, at termination, in the same transaction as the
/// session's terminal status flip. Never mutated or deleted; this is
/// what leaderboards and analytics read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameHistory {
    pub id: HistoryId,
    pub session_id: SessionId,
    pub game_id: GameId,
    pub player_one: UserId,
    pub player_two: UserId,
    /// `None` records a draw.
    pub winner: Option<UserId>,
    pub player_one_rating: RatingChange,
    pub player_two_rating: RatingChange,
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PlayerTally
// ---------------------------------------------------------------------------

/// Per-user rating and engagement counters.
///
/// Owned by the user profile in the surrounding platform; this core only
/// ever writes it through [`finalize`](crate::GameStore::finalize), once
/// per scored termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTally {
    pub user_id: UserId,
    pub rating: i32,
    pub games_played: i32,
    pub games_won: i32,
    pub points: i32,
}

impl PlayerTally {
    /// A fresh tally at the default rating, for users who never played.
    pub fn fresh(user_id: UserId) -> Self {
        Self {
            user_id,
            rating: gamelink_rating::DEFAULT_RATING,
            games_played: 0,
            games_won: 0,
            points: 0,
        }
    }
}
