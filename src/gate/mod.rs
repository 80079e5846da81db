//! The auth gate.
//!
//! [`GateMachine`] is the pure transition function; [`AuthGate`] runs its
//! commands against the adapters and feeds completions back in.

mod driver;
mod error;
mod machine;
mod ui;

pub use driver::{AuthGate, GateDeps};
pub use error::GateError;
pub use machine::{GateCommand, GateEvent, GateMachine, GatePhase};
pub use ui::{GateUi, LogGateUi, Notice};

/// User-visible messages, for hosts that match on them.
pub mod messages {
    pub use super::error::{
        ACCESS_REVOKED, ACCOUNT_BLOCKED, BLOCK_CHECK_FAILED, BLOCK_FAILED, INCORRECT_PIN,
        NOT_AUTHORIZED, PIN_REQUIRED, PIN_UNAVAILABLE, SIGN_IN_REQUIRED, SIGN_OUT_FAILED,
    };
}
