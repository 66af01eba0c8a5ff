//! `GamelinkServer` builder and accept loop.
//!
//! This is the entry point for running a game session server. It ties
//! together all the layers: transport → protocol → session → store.

use std::sync::Arc;

use gamelink_bus::{RealtimeBus, WsListener};
use gamelink_protocol::JsonCodec;
use gamelink_session::{
    ChallengeDispatcher, CoordinatorConfig, NotificationSink,
    PairingDirectory, ProfileLookup, SessionRouter,
};
use gamelink_store::GameStore;

use crate::handler::handle_connection;
use crate::{Authenticator, GamelinkError};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S, A, D>
where
    S: GameStore,
    A: Authenticator,
    D: PairingDirectory + ProfileLookup + NotificationSink,
{
    pub(crate) router: Arc<SessionRouter<S, D>>,
    pub(crate) dispatcher: ChallengeDispatcher<S, D>,
    pub(crate) bus: Arc<RealtimeBus>,
    pub(crate) auth: A,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Gamelink server.
///
/// # Example
///
/// ```rust,ignore
/// let server = GamelinkServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(store, directory, auth)
///     .await?;
/// server.run().await
/// ```
pub struct GamelinkServerBuilder {
    bind_addr: String,
    config: CoordinatorConfig,
}

impl GamelinkServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: CoordinatorConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the coordinator configuration.
    pub fn coordinator_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and assembles the server.
    pub async fn build<S, A, D>(
        self,
        store: S,
        directory: D,
        auth: A,
    ) -> Result<GamelinkServer<S, A, D>, GamelinkError>
    where
        S: GameStore,
        A: Authenticator,
        D: PairingDirectory + ProfileLookup + NotificationSink,
    {
        let listener = WsListener::bind(&self.bind_addr).await?;

        let bus = Arc::new(RealtimeBus::new());
        let store = Arc::new(store);
        let directory = Arc::new(directory);
        let router = Arc::new(SessionRouter::new(
            store,
            Arc::clone(&bus),
            Arc::clone(&directory),
            self.config,
        ));
        let dispatcher =
            ChallengeDispatcher::new(Arc::clone(&router), directory);

        let state = Arc::new(ServerState {
            router,
            dispatcher,
            bus,
            auth,
            codec: JsonCodec,
        });

        Ok(GamelinkServer { listener, state })
    }
}

impl Default for GamelinkServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Gamelink server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GamelinkServer<S, A, D>
where
    S: GameStore,
    A: Authenticator,
    D: PairingDirectory + ProfileLookup + NotificationSink,
{
    listener: WsListener,
    state: Arc<ServerState<S, A, D>>,
}

impl<S, A, D> GamelinkServer<S, A, D>
where
    S: GameStore,
    A: Authenticator,
    D: PairingDirectory + ProfileLookup + NotificationSink,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, GamelinkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the accept loop.
    ///
    /// Accepts incoming connections, performs the handshake, and spawns a
    /// handler task for each connected user. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), GamelinkError> {
        tracing::info!("Gamelink server running");

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
