//! Wire protocol for Skirmish.
//!
//! This crate defines the pieces every other layer agrees on:
//!
//! - **Identities** ([`PlayerId`], [`RoomId`]): who is talking and
//!   which room they are talking about.
//! - **Addressing** ([`Recipient`]): where an outbound event goes.
//! - **Envelope** ([`Envelope`]): sequence/timestamp framing around any
//!   payload.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become
//!   bytes and back.
//!
//! The game vocabulary itself (`ClientEvent`, `ServerEvent`) lives in
//! `skirmish-room`, next to the rules that produce and consume it. This
//! crate stays game-agnostic.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope<T>) → Room (events)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Envelope, PlayerId, Recipient, RoomId};
