//! Identity types and the session status machine.
//!
//! Ids are newtype wrappers around `i64`; the backing store hands out
//! signed 64-bit row ids, and wrapping them keeps a `UserId` from being
//! passed where a `SessionId` is expected. `#[serde(transparent)]` makes
//! each serialize as a plain number on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a platform user (one participant in a session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A unique identifier for a game session.
///
/// Stable for the session's lifetime; it doubles as the name of the
/// session's broadcast room (`game:<id>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A unique identifier for a game definition (chess, Xiangqi, tic-tac-toe…).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub i64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// A unique identifier for a completed-game ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryId(pub i64);

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// The lifecycle status of a game session.
///
/// Transitions only move forward; a terminal session can never be
/// resurrected:
///
/// ```text
/// Waiting → Active → { Completed | Abandoned }
///     └──────────────→ Abandoned  (forfeit before the game started)
/// ```
///
/// - **Waiting**: session exists, at least one ready flag is still false.
/// - **Active**: both participants acknowledged readiness; moves flow.
/// - **Completed**: a termination event ran the scoring pipeline. Terminal.
/// - **Abandoned**: a participant left before the game started (or the
///   session was administratively closed). No rating impact. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    /// Returns `true` once the session can never change again.
    ///
    /// Any event that arrives for a terminal session is a no-op; in
    /// particular, termination events must not re-trigger scoring.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Returns `true` while the game is being played.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` if moving to `target` respects the forward-only
    /// state machine.
    pub fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::Waiting => matches!(
                target,
                Self::Active | Self::Completed | Self::Abandoned
            ),
            Self::Active => {
                matches!(target, Self::Completed | Self::Abandoned)
            }
            Self::Completed | Self::Abandoned => false,
        }
    }

    /// The canonical lowercase name, as stored and as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Parses the canonical lowercase name back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(Self::Waiting),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_serializes_as_plain_number() {
        // `#[serde(transparent)]` means UserId(42) → `42`, not `{"0":42}`.
        let json = serde_json::to_string(&UserId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_session_id_deserializes_from_plain_number() {
        let sid: SessionId = serde_json::from_str("7").unwrap();
        assert_eq!(sid, SessionId(7));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(UserId(3).to_string(), "U-3");
        assert_eq!(SessionId(9).to_string(), "S-9");
        assert_eq!(GameId(1).to_string(), "G-1");
        assert_eq!(HistoryId(12).to_string(), "H-12");
    }

    #[test]
    fn test_status_terminal_states_are_absorbing() {
        for terminal in [SessionStatus::Completed, SessionStatus::Abandoned] {
            assert!(terminal.is_terminal());
            for target in [
                SessionStatus::Waiting,
                SessionStatus::Active,
                SessionStatus::Completed,
                SessionStatus::Abandoned,
            ] {
                assert!(
                    !terminal.can_transition_to(target),
                    "{terminal} must not transition to {target}"
                );
            }
        }
    }

    #[test]
    fn test_status_forward_transitions() {
        assert!(SessionStatus::Waiting.can_transition_to(SessionStatus::Active));
        assert!(
            SessionStatus::Waiting.can_transition_to(SessionStatus::Abandoned)
        );
        assert!(
            SessionStatus::Active.can_transition_to(SessionStatus::Completed)
        );
        assert!(
            !SessionStatus::Active.can_transition_to(SessionStatus::Waiting)
        );
    }

    #[test]
    fn test_status_as_str_parse_round_trip() {
        for status in [
            SessionStatus::Waiting,
            SessionStatus::Active,
            SessionStatus::Completed,
            SessionStatus::Abandoned,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("resurrected"), None);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::Waiting).unwrap();
        assert_eq!(json, "\"waiting\"");
    }
}
