//! Challenge dispatch: turning "let's play" into a session.

use std::sync::Arc;

use gamelink_bus::{ConnectionId, RealtimeBus, Room};
use gamelink_protocol::{GameId, ServerEvent, SessionId, UserId};
use gamelink_store::{GameStore, NewSession};

use crate::{
    ChallengeNotice, NotificationSink, PairingDirectory, ProfileLookup,
    SessionError, SessionRouter,
};

/// Creates sessions from challenges and pushes the invitation out.
///
/// Sequence: verify the pair, create the session row, write the durable
/// notification, then push realtime. The durable write comes before the
/// push so an invitee who is offline right now still finds the challenge
/// in their feed; the realtime event is best-effort on top.
pub struct ChallengeDispatcher<S, D> {
    router: Arc<SessionRouter<S, D>>,
    directory: Arc<D>,
}

impl<S, D> ChallengeDispatcher<S, D>
where
    S: GameStore,
    D: PairingDirectory + ProfileLookup + NotificationSink,
{
    pub fn new(router: Arc<SessionRouter<S, D>>, directory: Arc<D>) -> Self {
        Self { router, directory }
    }

    /// Dispatches a challenge from `challenger` (on `conn`) to `buddy`.
    ///
    /// On success the invitee's user room receives `game_challenge` on
    /// every connection, and the challenger's own connection gets an
    /// echo so it learns the new session id. Errors are returned to the
    /// caller; nothing is broadcast on failure.
    pub async fn dispatch(
        &self,
        challenger: UserId,
        conn: ConnectionId,
        game_id: GameId,
        buddy_id: UserId,
        game_title: String,
    ) -> Result<SessionId, SessionError> {
        if !self.directory.are_paired(challenger, buddy_id).await? {
            tracing::debug!(
                %challenger,
                buddy = %buddy_id,
                "challenge between unmatched users rejected"
            );
            return Err(SessionError::NotMatched {
                challenger,
                buddy: buddy_id,
            });
        }

        let (session, _handle) = self
            .router
            .open(NewSession {
                game_id,
                player_one: challenger,
                player_two: buddy_id,
            })
            .await?;

        let challenger_name =
            self.directory.display_name(challenger).await?;
        self.directory
            .notify(ChallengeNotice {
                user_id: buddy_id,
                session_id: session.id,
                message: format!(
                    "{challenger_name} challenged you to {game_title}"
                ),
            })
            .await?;

        let event = ServerEvent::GameChallenge {
            session_id: session.id,
            challenger_id: challenger,
            challenger_name,
            game_title,
        };
        let bus: &Arc<RealtimeBus> = self.router.bus();
        bus.broadcast(Room::User(buddy_id), &event, None);
        let _ = bus.send_to(conn, event);

        tracing::info!(
            session_id = %session.id,
            %challenger,
            buddy = %buddy_id,
            "challenge dispatched"
        );
        Ok(session.id)
    }
}
