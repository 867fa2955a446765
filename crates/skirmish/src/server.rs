//! `SkirmishServer` builder and accept loop.
//!
//! This is the entry point for running a Skirmish server. It ties the
//! layers together: transport → protocol → room manager → room actors.

use std::sync::Arc;

use skirmish_protocol::JsonCodec;
use skirmish_room::{ItemEffects, Journal, MapCatalog, RoomConfig, RoomManager};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{ServerConfig, SkirmishError, WebSocketTransport};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<M: MapCatalog> {
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) catalog: M,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Skirmish server.
///
/// ```rust,ignore
/// let server = SkirmishServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(InMemoryCatalog::from_json_dir("maps")?)
///     .await?;
/// server.run().await
/// ```
pub struct SkirmishServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    effects: Option<Arc<dyn ItemEffects>>,
    journal: Option<Arc<dyn Journal>>,
}

impl SkirmishServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
            effects: None,
            journal: None,
        }
    }

    /// Takes the bind address and room settings of `config`.
    pub fn config(mut self, config: &ServerConfig) -> Self {
        self.bind_addr = config.bind_addr.clone();
        self.room_config = config.room_config();
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    pub fn effects(mut self, effects: Arc<dyn ItemEffects>) -> Self {
        self.effects = Some(effects);
        self
    }

    pub fn journal(mut self, journal: Arc<dyn Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Binds the listener and builds the server around `catalog`.
    pub async fn build<M: MapCatalog>(self, catalog: M) -> Result<SkirmishServer<M>, SkirmishError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let mut rooms = RoomManager::new(self.room_config);
        if let Some(effects) = self.effects {
            rooms = rooms.with_effects(effects);
        }
        if let Some(journal) = self.journal {
            rooms = rooms.with_journal(journal);
        }

        let state = Arc::new(ServerState {
            rooms: Mutex::new(rooms),
            catalog,
            codec: JsonCodec,
        });
        Ok(SkirmishServer { transport, state })
    }
}

impl Default for SkirmishServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Skirmish server. Call [`run()`](Self::run) to start
/// accepting connections.
pub struct SkirmishServer<M: MapCatalog> {
    transport: WebSocketTransport,
    state: Arc<ServerState<M>>,
}

impl SkirmishServer<skirmish_room::InMemoryCatalog> {
    pub fn builder() -> SkirmishServerBuilder {
        SkirmishServerBuilder::new()
    }
}

impl<M: MapCatalog> SkirmishServer<M> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop, spawning a handler task per connection.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), SkirmishError> {
        tracing::info!("Skirmish server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
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
