//! Host-side effects the gate asks for: blocking alerts and navigation.

use tracing::info;

/// Synchronous user notices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notice {
    /// Sign-in succeeded; the PIN stage is next.
    PinRequired,
    AccountBlocked,
    SessionExpired,
}

impl Notice {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::PinRequired => "Success!",
            Self::AccountBlocked => "Account blocked",
            Self::SessionExpired => "Session expired",
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::PinRequired => "Insert PIN",
            Self::AccountBlocked => "Your account has been blocked. Please contact support.",
            Self::SessionExpired => "Your session has expired.",
        }
    }
}

pub trait GateUi: Send + Sync {
    /// Shows a notice. Returns once the user has seen it.
    fn alert(&self, notice: Notice);

    /// Replaces the current route.
    fn navigate(&self, route: &str);
}

/// Headless UI that only records what would have been shown.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogGateUi;

impl GateUi for LogGateUi {
    fn alert(&self, notice: Notice) {
        info!(title = notice.title(), "{}", notice.message());
    }

    fn navigate(&self, route: &str) {
        info!(route, "navigate");
    }
}
