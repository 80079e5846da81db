//! # Dirgate (gated restaurant and employee directory)
//!
//! `dirgate` couples an access gate with a filterable directory of restaurants
//! and employees.
//!
//! ## Access gate
//!
//! Access requires four things at the same instant: an allow-listed identity,
//! a verified PIN, a per-login session token, and the absence of a block
//! record for the identity.
//!
//! - **State machine:** [`gate::GateMachine`] is a pure transition function over
//!   named phases; [`gate::AuthGate`] drives it against the identity provider,
//!   PIN gateway, block list, login audit and session storage.
//! - **Lockout:** three rejected PINs within a session write a block record and
//!   tear the session down. Blocks never expire on their own.
//! - **Cross-tab logout:** clearing the session token publishes an invalidation
//!   on [`session::SessionChannel`]; sibling tabs tear their own session down.
//!
//! ## Directory
//!
//! Heterogeneous documents are normalized once, right after fetch, into
//! [`directory::DirectoryRecord`]. Filtering, facets and fallback photo
//! backfill operate on canonical records only. The HTTP surface in [`api`]
//! serves normalized, filtered listings only to callers whose cookies carry a
//! marker the PIN gateway accepts.

pub mod api;
pub mod cli;
pub mod config;
pub mod directory;
pub mod gate;
pub mod identity;
pub mod pin;
pub mod session;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
