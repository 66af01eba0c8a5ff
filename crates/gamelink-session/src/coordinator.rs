//! Session coordinator: an isolated Tokio task that owns one game session.
//!
//! Each live session runs in its own task and receives commands through an
//! mpsc channel. Because the actor processes its mailbox one command at a
//! time, all mutations of a session are serialized; two `game_over`
//! events for the same session can never race, which is half of the
//! exactly-once scoring story (the store's terminal guard is the other
//! half, covering restarts).
//!
//! Ordering rule: every mutation is made durable in the store before the
//! corresponding broadcast goes out. A client that reconnects right after
//! hearing a broadcast always finds a store state at least as new.

use std::future::Future;
use std::sync::Arc;

use gamelink_bus::{ConnectionId, RealtimeBus, Room};
use gamelink_protocol::{
    RatingLine, ServerEvent, SessionId, SessionSnapshot, SessionStatus,
    UserId, WinnerSide,
};
use gamelink_rating::{Outcome, rate};
use gamelink_store::{
    GameSession, GameStore, ParticipantRole, SessionOutcome, StoreError,
};
use tokio::sync::{mpsc, oneshot};

use crate::{CoordinatorConfig, ProfileLookup, SessionError};

/// Commands sent to a session coordinator through its channel.
pub(crate) enum Command {
    /// Subscribe a connection to the session room and fetch a private
    /// snapshot. `None` means the session is unknown to this user;
    /// either it does not exist or they are not a participant; the two
    /// are deliberately indistinguishable.
    Join {
        user: UserId,
        conn: ConnectionId,
        reply: oneshot::Sender<Option<SessionSnapshot>>,
    },

    /// Flip the caller's ready flag. Idempotent.
    Ready { user: UserId, conn: ConnectionId },

    /// Persist a state blob and relay the move to the rest of the room.
    Move {
        user: UserId,
        conn: ConnectionId,
        mv: serde_json::Value,
        state: String,
    },

    /// Natural end of the game.
    GameOver {
        user: UserId,
        conn: ConnectionId,
        winner_id: Option<UserId>,
        winner_side: Option<WinnerSide>,
        is_draw: bool,
    },

    /// Voluntary exit.
    Forfeit { user: UserId, conn: ConnectionId },

    /// Stop the actor.
    Shutdown,
}

/// Handle to a running session coordinator. Cheap to clone.
#[derive(Clone)]
pub struct CoordinatorHandle {
    session_id: SessionId,
    sender: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// True once the actor has stopped and its channel closed.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn join(
        &self,
        user: UserId,
        conn: ConnectionId,
    ) -> Result<Option<SessionSnapshot>, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Join {
            user,
            conn,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SessionError::Unavailable(self.session_id))
    }

    pub async fn ready(
        &self,
        user: UserId,
        conn: ConnectionId,
    ) -> Result<(), SessionError> {
        self.send(Command::Ready { user, conn }).await
    }

    pub async fn submit_move(
        &self,
        user: UserId,
        conn: ConnectionId,
        mv: serde_json::Value,
        state: String,
    ) -> Result<(), SessionError> {
        self.send(Command::Move {
            user,
            conn,
            mv,
            state,
        })
        .await
    }

    pub async fn game_over(
        &self,
        user: UserId,
        conn: ConnectionId,
        winner_id: Option<UserId>,
        winner_side: Option<WinnerSide>,
        is_draw: bool,
    ) -> Result<(), SessionError> {
        self.send(Command::GameOver {
            user,
            conn,
            winner_id,
            winner_side,
            is_draw,
        })
        .await
    }

    pub async fn forfeit(
        &self,
        user: UserId,
        conn: ConnectionId,
    ) -> Result<(), SessionError> {
        self.send(Command::Forfeit { user, conn }).await
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, cmd: Command) -> Result<(), SessionError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| SessionError::Unavailable(self.session_id))
    }
}

/// The coordinator actor. Runs inside a Tokio task.
struct SessionActor<S, P> {
    /// Cached copy of the session row; the store is updated first and
    /// this cache second, so the cache is never ahead of durable state.
    session: GameSession,
    store: Arc<S>,
    bus: Arc<RealtimeBus>,
    profiles: Arc<P>,
    config: CoordinatorConfig,
    receiver: mpsc::Receiver<Command>,
}

impl<S: GameStore, P: ProfileLookup> SessionActor<S, P> {
    async fn run(mut self) {
        let id = self.session.id;
        tracing::info!(session_id = %id, "session coordinator started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                Command::Join { user, conn, reply } => {
                    let snapshot = self.handle_join(user, conn);
                    let _ = reply.send(snapshot);
                }
                Command::Ready { user, conn } => {
                    self.handle_ready(user, conn).await;
                }
                Command::Move {
                    user,
                    conn,
                    mv,
                    state,
                } => {
                    self.handle_move(user, conn, mv, state).await;
                }
                Command::GameOver {
                    user,
                    conn,
                    winner_id,
                    winner_side,
                    is_draw,
                } => {
                    self.handle_game_over(
                        user,
                        conn,
                        winner_id,
                        winner_side,
                        is_draw,
                    )
                    .await;
                }
                Command::Forfeit { user, conn } => {
                    self.handle_forfeit(user, conn).await;
                }
                Command::Shutdown => break,
            }
        }

        tracing::info!(session_id = %id, "session coordinator stopped");
    }

    fn room(&self) -> Room {
        Room::Game(self.session.id)
    }

    // -- join ---------------------------------------------------------------

    fn handle_join(
        &mut self,
        user: UserId,
        conn: ConnectionId,
    ) -> Option<SessionSnapshot> {
        if self.session.role_of(user) == ParticipantRole::Neither {
            tracing::debug!(
                session_id = %self.session.id,
                %user,
                "join from non-participant, ignoring"
            );
            return None;
        }

        if let Err(e) = self.bus.subscribe(self.room(), conn) {
            tracing::warn!(
                session_id = %self.session.id,
                %conn,
                error = %e,
                "could not subscribe joining connection"
            );
            return None;
        }

        tracing::debug!(
            session_id = %self.session.id,
            %user,
            %conn,
            "participant joined session room"
        );
        Some(self.session.snapshot())
    }

    // -- ready --------------------------------------------------------------

    async fn handle_ready(&mut self, user: UserId, conn: ConnectionId) {
        let role = self.session.role_of(user);
        if role == ParticipantRole::Neither {
            return;
        }
        if self.session.status.is_terminal() {
            tracing::debug!(
                session_id = %self.session.id,
                %user,
                "ready on terminal session, ignoring"
            );
            return;
        }

        // Idempotence: a flag that is already up changes nothing and
        // re-broadcasts nothing, so game_start can only fire once.
        let already = match role {
            ParticipantRole::PlayerOne => self.session.player_one_ready,
            ParticipantRole::PlayerTwo => self.session.player_two_ready,
            ParticipantRole::Neither => unreachable!(),
        };
        if already {
            return;
        }

        let one = self.session.player_one_ready
            || role == ParticipantRole::PlayerOne;
        let two = self.session.player_two_ready
            || role == ParticipantRole::PlayerTwo;
        let status = if one && two {
            SessionStatus::Active
        } else {
            self.session.status
        };

        let result = self
            .store_call(self.store.update_readiness(
                self.session.id,
                one,
                two,
                status,
            ))
            .await;
        if let Err(e) = result {
            self.report_transient(conn, &e);
            return;
        }

        let starting = status == SessionStatus::Active
            && self.session.status != SessionStatus::Active;
        self.session.player_one_ready = one;
        self.session.player_two_ready = two;
        self.session.status = status;

        if starting {
            tracing::info!(session_id = %self.session.id, "game started");
            self.bus.broadcast(
                self.room(),
                &ServerEvent::GameStart {
                    session_id: self.session.id,
                },
                None,
            );
        } else {
            self.bus.broadcast(
                self.room(),
                &ServerEvent::PlayerReady { user_id: user },
                None,
            );
        }
    }

    // -- move ---------------------------------------------------------------

    async fn handle_move(
        &mut self,
        user: UserId,
        conn: ConnectionId,
        mv: serde_json::Value,
        state: String,
    ) {
        if self.session.role_of(user) == ParticipantRole::Neither {
            tracing::debug!(
                session_id = %self.session.id,
                %user,
                "move from non-participant, ignoring"
            );
            return;
        }
        if self.session.status.is_terminal() {
            tracing::debug!(
                session_id = %self.session.id,
                %user,
                "move on terminal session, ignoring"
            );
            return;
        }

        // No turn or legality checks: the clients own the rules, the
        // server persists and relays. The blob is last-writer-wins.
        let next_turn = self
            .session
            .opponent_of(user)
            .unwrap_or(self.session.current_turn);

        let result = self
            .store_call(self.store.update_state(
                self.session.id,
                &state,
                next_turn,
            ))
            .await;
        match result {
            Ok(()) => {}
            // The cached status can trail the store across a restart; the
            // store's own guard wins and the late move is dropped.
            Err(SessionError::Store(StoreError::AlreadyTerminal(_))) => {
                self.session.status = SessionStatus::Completed;
                return;
            }
            Err(e) => {
                self.report_transient(conn, &e);
                return;
            }
        }

        self.session.state = Some(state.clone());
        self.session.current_turn = next_turn;

        // The sender already applied its own move locally.
        self.bus.broadcast(
            self.room(),
            &ServerEvent::Move {
                session_id: self.session.id,
                user_id: user,
                mv,
                state,
            },
            Some(conn),
        );
    }

    // -- game over ----------------------------------------------------------

    async fn handle_game_over(
        &mut self,
        user: UserId,
        conn: ConnectionId,
        winner_id: Option<UserId>,
        winner_side: Option<WinnerSide>,
        is_draw: bool,
    ) {
        if self.session.role_of(user) == ParticipantRole::Neither {
            return;
        }
        if self.session.status.is_terminal() {
            tracing::debug!(
                session_id = %self.session.id,
                "duplicate termination, ignoring"
            );
            return;
        }

        let winner = if is_draw {
            None
        } else if let Some(w) = winner_id {
            if self.session.role_of(w) == ParticipantRole::Neither {
                self.report(conn, 400, "winner is not a participant");
                return;
            }
            Some(w)
        } else if let Some(side) = winner_side {
            Some(match side {
                WinnerSide::PlayerOne => self.session.player_one,
                WinnerSide::PlayerTwo => self.session.player_two,
            })
        } else {
            self.report(conn, 400, "game_over names no winner");
            return;
        };

        if let Some(stats) = self.finalize(winner, conn).await {
            self.bus.broadcast(self.room(), &stats, None);
        }
    }

    // -- forfeit ------------------------------------------------------------

    async fn handle_forfeit(&mut self, user: UserId, conn: ConnectionId) {
        if self.session.role_of(user) == ParticipantRole::Neither {
            return;
        }
        if self.session.status.is_terminal() {
            return;
        }

        let Some(opponent) = self.session.opponent_of(user) else {
            return;
        };

        match self.session.status {
            SessionStatus::Waiting => {
                // Nobody started playing; the session is abandoned with
                // no rating or ledger impact.
                let result = self
                    .store_call(self.store.abandon(self.session.id))
                    .await;
                match result {
                    Ok(()) => {}
                    Err(SessionError::Store(
                        StoreError::AlreadyTerminal(_),
                    )) => {
                        self.session.status = SessionStatus::Abandoned;
                        return;
                    }
                    Err(e) => {
                        self.report_transient(conn, &e);
                        return;
                    }
                }
                self.session.status = SessionStatus::Abandoned;
                tracing::info!(
                    session_id = %self.session.id,
                    %user,
                    "session abandoned before start"
                );

                let winner_name = self.display_name(opponent).await;
                self.bus.broadcast(
                    self.room(),
                    &ServerEvent::OpponentForfeit {
                        session_id: self.session.id,
                        winner_name,
                    },
                    Some(conn),
                );
            }
            SessionStatus::Active => {
                // Forfeiting a live game hands the win to the opponent
                // and goes through the full scoring pipeline.
                let Some(stats) = self.finalize(Some(opponent), conn).await
                else {
                    return;
                };
                tracing::info!(
                    session_id = %self.session.id,
                    %user,
                    winner = %opponent,
                    "session forfeited"
                );

                let winner_name = self.display_name(opponent).await;
                self.bus.broadcast(
                    self.room(),
                    &ServerEvent::OpponentForfeit {
                        session_id: self.session.id,
                        winner_name,
                    },
                    Some(conn),
                );
                self.bus.broadcast(self.room(), &stats, None);
            }
            _ => unreachable!("terminal handled above"),
        }
    }

    // -- scoring ------------------------------------------------------------

    /// Runs the termination pipeline: rate both players from their
    /// current tallies, finalize atomically in the store, update the
    /// cache, and build the stats broadcast. Returns `None` when nothing
    /// should be broadcast (duplicate termination or store failure).
    async fn finalize(
        &mut self,
        winner: Option<UserId>,
        conn: ConnectionId,
    ) -> Option<ServerEvent> {
        let (p1, p2) = (self.session.player_one, self.session.player_two);

        let tallies = async {
            let one = self.store.tally(p1).await?;
            let two = self.store.tally(p2).await?;
            Ok((one, two))
        };
        let (tally_one, tally_two) = match self.store_call(tallies).await {
            Ok(t) => t,
            Err(e) => {
                self.report_transient(conn, &e);
                return None;
            }
        };

        let outcome = match winner {
            Some(w) if w == p1 => Outcome::PlayerOneWins,
            Some(_) => Outcome::PlayerTwoWins,
            None => Outcome::Draw,
        };
        let (change_one, change_two) =
            rate(tally_one.rating, tally_two.rating, outcome);

        let result = self
            .store_call(self.store.finalize(SessionOutcome {
                session_id: self.session.id,
                winner,
                player_one: change_one,
                player_two: change_two,
            }))
            .await;
        match result {
            Ok(_) => {}
            Err(SessionError::Store(StoreError::AlreadyTerminal(_))) => {
                // Lost a race with another termination path (can only
                // happen across a restart); adopt the terminal state and
                // stay silent.
                self.session.status = SessionStatus::Completed;
                tracing::debug!(
                    session_id = %self.session.id,
                    "session already finalized, ignoring"
                );
                return None;
            }
            Err(e) => {
                self.report_transient(conn, &e);
                return None;
            }
        }

        self.session.status = SessionStatus::Completed;
        self.session.winner = winner;
        tracing::info!(
            session_id = %self.session.id,
            winner = ?winner,
            "session completed and scored"
        );

        Some(ServerEvent::GameOverStats {
            session_id: self.session.id,
            winner_id: winner,
            is_draw: winner.is_none(),
            ratings: vec![
                RatingLine {
                    user_id: p1,
                    before: change_one.before,
                    after: change_one.after,
                },
                RatingLine {
                    user_id: p2,
                    before: change_two.before,
                    after: change_two.after,
                },
            ],
        })
    }

    // -- helpers ------------------------------------------------------------

    async fn store_call<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, SessionError> {
        match tokio::time::timeout(self.config.store_timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(SessionError::Store(e)),
            Err(_) => Err(SessionError::StoreTimeout),
        }
    }

    async fn display_name(&self, user: UserId) -> String {
        match self.profiles.display_name(user).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(%user, error = %e, "profile lookup failed");
                format!("User {}", user.0)
            }
        }
    }

    /// Delivers an error event to the calling connection only. Failures
    /// never become room broadcasts.
    fn report(&self, conn: ConnectionId, code: u16, message: &str) {
        let _ = self.bus.send_to(
            conn,
            ServerEvent::Error {
                code,
                message: message.to_string(),
            },
        );
    }

    fn report_transient(&self, conn: ConnectionId, error: &SessionError) {
        tracing::warn!(
            session_id = %self.session.id,
            %error,
            "store operation failed"
        );
        self.report(conn, 503, "temporary storage failure, try again");
    }
}

/// Spawns a coordinator task for a session and returns its handle.
pub(crate) fn spawn_session<S: GameStore, P: ProfileLookup>(
    session: GameSession,
    store: Arc<S>,
    bus: Arc<RealtimeBus>,
    profiles: Arc<P>,
    config: CoordinatorConfig,
) -> CoordinatorHandle {
    let session_id = session.id;
    let (tx, rx) = mpsc::channel(config.mailbox_size);

    let actor = SessionActor {
        session,
        store,
        bus,
        profiles,
        config,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    CoordinatorHandle {
        session_id,
        sender: tx,
    }
}
