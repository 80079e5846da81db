//! User-facing gate errors.

pub const NOT_AUTHORIZED: &str = "This account is not authorized to access this app.";
pub const SIGN_IN_REQUIRED: &str = "Sign in with Google to continue.";
pub const PIN_REQUIRED: &str = "Enter the required PIN to continue.";
pub const INCORRECT_PIN: &str = "Incorrect PIN. Please try again.";
pub const PIN_UNAVAILABLE: &str = "Unable to verify PIN right now.";
pub const ACCOUNT_BLOCKED: &str = "This account is blocked.";
pub const BLOCK_FAILED: &str = "Unable to block account right now.";
pub const BLOCK_CHECK_FAILED: &str = "Unable to verify account status right now. Please try again.";
pub const SIGN_OUT_FAILED: &str = "Unable to sign out right now.";
pub const ACCESS_REVOKED: &str = "Your session no longer has access to this data. Please sign in again.";

/// Every variant displays only its user message.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// Unauthenticated or disallowed principal. Needs a new sign-in.
    #[error("{0}")]
    Authorization(String),
    /// Bad input, retryable, never counted.
    #[error("{0}")]
    Validation(String),
    /// Wrong PIN, counted towards the lockout.
    #[error("{message}")]
    Rejected { message: String, attempts: u32 },
    /// PIN gateway or document store unreachable.
    #[error("{0}")]
    Transport(String),
    /// Data store refused a read; fatal to the session.
    #[error("{0}")]
    Permission(String),
}

impl GateError {
    pub(crate) fn authorization(message: &str) -> Self {
        Self::Authorization(message.to_string())
    }

    pub(crate) fn validation(message: &str) -> Self {
        Self::Validation(message.to_string())
    }

    pub(crate) fn transport(message: &str) -> Self {
        Self::Transport(message.to_string())
    }

    /// Whether the same action may simply be tried again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Rejected { .. } | Self::Transport(_)
        )
    }
}
