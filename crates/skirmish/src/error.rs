//! Unified error type of the server.

use skirmish_protocol::ProtocolError;
use skirmish_room::RoomError;

use crate::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SkirmishError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (full, not found, invalid map).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}
