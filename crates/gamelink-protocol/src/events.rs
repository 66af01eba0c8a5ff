//! The realtime event surface.
//!
//! Every message on the wire is one of two internally tagged enums:
//! [`ClientEvent`] (client → server) and [`ServerEvent`] (server → client).
//! `#[serde(tag = "type", rename_all = "snake_case")]` produces JSON like:
//!
//! ```json
//! { "type": "ready", "session_id": 4 }
//! { "type": "player_ready", "user_id": 12 }
//! ```
//!
//! Move payloads are opaque: the server persists and relays whatever board
//! representation the clients agreed on (FEN string, move list, cell
//! coordinates…) without interpreting it. Legality is a client concern.

use serde::{Deserialize, Serialize};

use crate::{GameId, SessionId, SessionStatus, UserId};

// ---------------------------------------------------------------------------
// Supporting payload types
// ---------------------------------------------------------------------------

/// Which seat a `game_over` event names as the winner when the client
/// reports a color/token instead of a user id.
///
/// Clients for different games use different side labels; the aliases map
/// the common ones onto the two seats. `player_one` is always the
/// challenger's seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinnerSide {
    /// The first seat: `player1`, chess white, Xiangqi red, tic-tac-toe X.
    #[serde(
        rename = "player1",
        alias = "white",
        alias = "red",
        alias = "x"
    )]
    PlayerOne,
    /// The second seat: `player2`, chess black, Xiangqi black, tic-tac-toe O.
    #[serde(rename = "player2", alias = "black", alias = "o")]
    PlayerTwo,
}

/// A private snapshot of a session, sent in reply to `join`.
///
/// This is everything a reconnecting client needs to resume: who is
/// playing, whether the game started, whose turn the clients last agreed
/// on, and the last persisted state blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub game_id: GameId,
    pub status: SessionStatus,
    pub player_one: UserId,
    pub player_two: UserId,
    pub player_one_ready: bool,
    pub player_two_ready: bool,
    pub current_turn: UserId,
    /// Last-known board/move representation, if any move was persisted.
    pub state: Option<String>,
    pub winner: Option<UserId>,
}

/// One participant's rating movement, reported in `game_over_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingLine {
    pub user_id: UserId,
    pub before: i32,
    pub after: i32,
}

// ---------------------------------------------------------------------------
// ClientEvent
// ---------------------------------------------------------------------------

/// Events a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// First message on every connection. `token` is an opaque credential
    /// handed to the [`Authenticator`] seam; `version` guards against
    /// incompatible clients.
    ///
    /// [`Authenticator`]: https://docs.rs/gamelink
    Handshake {
        version: u32,
        token: Option<String>,
    },

    /// Keep-alive. Turn-based clients sit idle for long stretches while
    /// waiting on the opponent; heartbeats keep the read timeout from
    /// dropping them.
    Heartbeat { client_time: u64 },

    /// Subscribe to a session's room and request a private snapshot.
    /// Unknown session ids get no reply (recoverable, not fatal).
    Join { session_id: SessionId },

    /// Acknowledge readiness. Idempotent per participant.
    Ready { session_id: SessionId },

    /// Report a move: `move` is relayed verbatim to the rest of the room,
    /// `state` overwrites the session's persisted blob (last-writer-wins).
    Move {
        session_id: SessionId,
        #[serde(rename = "move")]
        mv: serde_json::Value,
        state: String,
    },

    /// Natural end of a game. The winner is named either directly
    /// (`winner_id`) or by side token (`winner_side`); `is_draw` trumps
    /// both.
    GameOver {
        session_id: SessionId,
        #[serde(default)]
        winner_id: Option<UserId>,
        #[serde(default)]
        winner_side: Option<WinnerSide>,
        #[serde(default)]
        is_draw: bool,
    },

    /// Voluntary exit. Before the game starts this abandons the session;
    /// once active it hands the win to the opponent.
    Forfeit { session_id: SessionId },

    /// Invite a matched buddy to play `game_id`.
    Challenge {
        game_id: GameId,
        buddy_id: UserId,
        game_title: String,
    },

    /// Orderly goodbye.
    Disconnect { reason: String },
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Reply to a successful handshake.
    HandshakeAck { user_id: UserId },

    /// Reply to a heartbeat; echoes the client clock for RTT measurement.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Private reply to `join`: the session as the store last saw it.
    InitGame(SessionSnapshot),

    /// Broadcast when one participant is ready but the other isn't yet.
    PlayerReady { user_id: UserId },

    /// Broadcast exactly once, when both ready flags flip true.
    GameStart { session_id: SessionId },

    /// Move relay. Delivered to every room member except the sender;
    /// the sender already applied its own move locally.
    Move {
        session_id: SessionId,
        user_id: UserId,
        #[serde(rename = "move")]
        mv: serde_json::Value,
        state: String,
    },

    /// Termination broadcast with the rating pipeline's output.
    GameOverStats {
        session_id: SessionId,
        winner_id: Option<UserId>,
        is_draw: bool,
        ratings: Vec<RatingLine>,
    },

    /// Forfeit notice, delivered to everyone except the forfeiter.
    OpponentForfeit {
        session_id: SessionId,
        winner_name: String,
    },

    /// Challenge push into the invitee's user room (also echoed to the
    /// challenger's connection so it learns the new session id).
    GameChallenge {
        session_id: SessionId,
        challenger_id: UserId,
        challenger_name: String,
        game_title: String,
    },

    /// Something went wrong. `code` follows HTTP-ish conventions
    /// (400 bad request, 401 unauthorized, 503 transient store failure).
    Error { code: u16, message: String },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire format is load-bearing: browser clients match on the
    //! `type` tag and snake_case field names. These tests pin the exact
    //! JSON shapes.

    use super::*;

    #[test]
    fn test_client_event_ready_json_format() {
        let ev = ClientEvent::Ready {
            session_id: SessionId(4),
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "ready");
        assert_eq!(json["session_id"], 4);
    }

    #[test]
    fn test_client_event_move_uses_move_field_name() {
        // The field is `mv` in Rust (`move` is a keyword) but must be
        // `"move"` on the wire.
        let ev = ClientEvent::Move {
            session_id: SessionId(1),
            mv: serde_json::json!({ "from": "e2", "to": "e4" }),
            state: "rnbqkbnr/...".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "move");
        assert_eq!(json["move"]["from"], "e2");
        assert_eq!(json["state"], "rnbqkbnr/...");
    }

    #[test]
    fn test_client_event_game_over_defaults() {
        // winner_id / winner_side / is_draw are all optional on the wire.
        let json = r#"{ "type": "game_over", "session_id": 9 }"#;
        let ev: ClientEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            ev,
            ClientEvent::GameOver {
                session_id: SessionId(9),
                winner_id: None,
                winner_side: None,
                is_draw: false,
            }
        );
    }

    #[test]
    fn test_winner_side_accepts_color_aliases() {
        for (token, side) in [
            ("\"player1\"", WinnerSide::PlayerOne),
            ("\"white\"", WinnerSide::PlayerOne),
            ("\"red\"", WinnerSide::PlayerOne),
            ("\"x\"", WinnerSide::PlayerOne),
            ("\"player2\"", WinnerSide::PlayerTwo),
            ("\"black\"", WinnerSide::PlayerTwo),
            ("\"o\"", WinnerSide::PlayerTwo),
        ] {
            let parsed: WinnerSide = serde_json::from_str(token).unwrap();
            assert_eq!(parsed, side, "token {token}");
        }
    }

    #[test]
    fn test_client_event_challenge_round_trip() {
        let ev = ClientEvent::Challenge {
            game_id: GameId(2),
            buddy_id: UserId(7),
            game_title: "Xiangqi".into(),
        };
        let bytes = serde_json::to_vec(&ev).unwrap();
        let decoded: ClientEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(ev, decoded);
    }

    #[test]
    fn test_server_event_init_game_is_flat() {
        // Internally tagged newtype variant: snapshot fields sit beside
        // the tag, not nested under a wrapper key.
        let ev = ServerEvent::InitGame(SessionSnapshot {
            session_id: SessionId(3),
            game_id: GameId(1),
            status: SessionStatus::Waiting,
            player_one: UserId(10),
            player_two: UserId(20),
            player_one_ready: true,
            player_two_ready: false,
            current_turn: UserId(10),
            state: None,
            winner: None,
        });
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "init_game");
        assert_eq!(json["session_id"], 3);
        assert_eq!(json["status"], "waiting");
        assert_eq!(json["player_one_ready"], true);
        assert!(json["state"].is_null());
    }

    #[test]
    fn test_server_event_game_over_stats_json_format() {
        let ev = ServerEvent::GameOverStats {
            session_id: SessionId(5),
            winner_id: Some(UserId(10)),
            is_draw: false,
            ratings: vec![
                RatingLine {
                    user_id: UserId(10),
                    before: 1200,
                    after: 1216,
                },
                RatingLine {
                    user_id: UserId(20),
                    before: 1200,
                    after: 1184,
                },
            ],
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "game_over_stats");
        assert_eq!(json["winner_id"], 10);
        assert_eq!(json["ratings"][0]["after"], 1216);
        assert_eq!(json["ratings"][1]["after"], 1184);
    }

    #[test]
    fn test_server_event_round_trips() {
        let events = vec![
            ServerEvent::HandshakeAck { user_id: UserId(1) },
            ServerEvent::HeartbeatAck {
                client_time: 5,
                server_time: 6,
            },
            ServerEvent::PlayerReady { user_id: UserId(2) },
            ServerEvent::GameStart {
                session_id: SessionId(3),
            },
            ServerEvent::OpponentForfeit {
                session_id: SessionId(4),
                winner_name: "Mei Lin".into(),
            },
            ServerEvent::GameChallenge {
                session_id: SessionId(5),
                challenger_id: UserId(6),
                challenger_name: "Ah Seng".into(),
                game_title: "Chess".into(),
            },
            ServerEvent::Error {
                code: 503,
                message: "store timed out".into(),
            },
        ];
        for ev in events {
            let bytes = serde_json::to_vec(&ev).unwrap();
            let decoded: ServerEvent =
                serde_json::from_slice(&bytes).unwrap();
            assert_eq!(ev, decoded);
        }
    }

    #[test]
    fn test_decode_unknown_event_type_returns_error() {
        let unknown = r#"{ "type": "teleport", "speed": 9000 }"#;
        let result: Result<ClientEvent, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
