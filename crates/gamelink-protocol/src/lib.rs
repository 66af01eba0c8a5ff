//! Wire protocol for Gamelink.
//!
//! This crate defines the "language" that game clients and the server speak:
//!
//! - **Identity** ([`UserId`], [`SessionId`], [`GameId`], [`HistoryId`]):
//!   newtype ids shared by every layer.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): the tagged messages
//!   that travel on the wire, named after the realtime event surface
//!   (`join`, `ready`, `move`, `game_over_stats`, …).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events are converted
//!   to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   decoding.
//!
//! The protocol layer sits below the bus and the session coordinator. It
//! doesn't know about connections, rooms, or persistence; it only knows
//! how to serialize and deserialize events.

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{
    ClientEvent, RatingLine, ServerEvent, SessionSnapshot, WinnerSide,
};
pub use types::{GameId, HistoryId, SessionId, SessionStatus, UserId};
