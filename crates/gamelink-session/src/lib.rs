//! Session orchestration for Gamelink.
//!
//! The pieces, from the inside out:
//!
//! - Each live session is owned by a coordinator actor (one Tokio task,
//!   one mailbox). The mailbox serializes everything that happens to a
//!   session, so readiness, moves, and termination never race.
//! - [`SessionRouter`] spawns coordinators lazily from the store and
//!   hands out [`CoordinatorHandle`]s.
//! - [`ChallengeDispatcher`] turns a challenge between matched buddies
//!   into a new session plus a durable notification plus a realtime push.
//! - The directory traits ([`PairingDirectory`], [`ProfileLookup`],
//!   [`NotificationSink`]) are the seams to the surrounding platform.
//!
//! Two rules hold everywhere: a mutation is durable in the store before
//! its broadcast goes out, and a session is scored at most once (the
//! actor's cached status catches duplicates in-process, the store's
//! terminal guard catches them across restarts).

mod config;
mod coordinator;
mod dispatcher;
mod directory;
mod error;
mod router;

pub use config::CoordinatorConfig;
pub use coordinator::CoordinatorHandle;
pub use dispatcher::ChallengeDispatcher;
pub use directory::{
    ChallengeNotice, MemoryDirectory, NotificationSink, PairingDirectory,
    ProfileLookup,
};
pub use error::SessionError;
pub use router::SessionRouter;
