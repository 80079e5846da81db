//! Session token storage and cross-tab invalidation.
//!
//! Flow Overview:
//! 1) An allowed identity gets a freshly minted [`SessionToken`] persisted in
//!    cross-tab storage ([`SessionStore`]).
//! 2) Every write publishes [`SignalKind::Issued`] and every effective clear
//!    publishes [`SignalKind::Invalidated`] on the [`SessionChannel`].
//! 3) Sibling tabs consume signals through a [`SessionListener`] and tear
//!    their own session down when the token disappears.

mod channel;
mod store;
mod token;

pub use channel::{SessionChannel, SessionListener, SessionSignal, SignalKind, TabId};
pub use store::{MemorySessionStore, SessionStore, StorageError, SESSION_TOKEN_KEY};
pub use token::SessionToken;
