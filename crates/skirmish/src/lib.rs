//! # Skirmish
//!
//! Authoritative server for turn-based tactical rooms on a tile grid.
//!
//! Clients connect over WebSocket and exchange JSON envelopes carrying
//! [`ClientEvent`](skirmish_room::ClientEvent) /
//! [`ServerEvent`](skirmish_room::ServerEvent). Each room runs as its own
//! actor task in `skirmish-room`; this crate accepts connections, routes
//! lobby requests, and forwards everything else to the player's room.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skirmish::prelude::*;
//!
//! # async fn run() -> Result<(), SkirmishError> {
//! let catalog = InMemoryCatalog::from_json_dir("maps")?;
//! let server = SkirmishServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(catalog)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;
mod transport;

pub use config::ServerConfig;
pub use error::SkirmishError;
pub use server::{SkirmishServer, SkirmishServerBuilder};
pub use transport::{
    ConnectionReader, ConnectionWriter, TransportError, WebSocketConnection, WebSocketTransport,
};

pub mod prelude {
    pub use crate::{ServerConfig, SkirmishError, SkirmishServer, SkirmishServerBuilder};
    pub use skirmish_grid::{Grid, Position, Tile};
    pub use skirmish_protocol::{Codec, Envelope, JsonCodec, PlayerId, RoomId};
    pub use skirmish_room::{
        CharacterSheet, ClientEvent, DiceBonus, GameMode, GameRules, InMemoryCatalog, ItemKind,
        ItemPlacement, MapCatalog, MapLayout, Profile, RoomConfig, RoomError, ServerEvent,
        StatBonus,
    };
}
