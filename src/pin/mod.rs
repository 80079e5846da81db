//! PIN gateway seam.
//!
//! The gateway owns the PIN secret and a "PIN verified" marker cookie:
//! - `GET /api/pin`: 200 when the marker cookie is present and valid.
//! - `POST /api/pin` `{pin}`: 200 sets the marker, 401 `{error}` rejects.
//! - `DELETE /api/pin`: clears the marker, best-effort.

mod http;

pub use http::HttpPinGateway;

use async_trait::async_trait;

/// Gateway answer to a PIN submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PinVerdict {
    Verified,
    /// Wrong PIN. `message` is the gateway's own error text, if it sent one.
    Rejected { message: Option<String> },
}

/// Transport-level failures. None of these count as a rejected attempt.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PinGatewayError {
    #[error("PIN gateway unreachable: {0}")]
    Network(String),
    #[error("PIN gateway returned status {0}")]
    Status(u16),
    #[error("PIN gateway misconfigured: {0}")]
    Config(String),
}

#[async_trait]
pub trait PinGateway: Send + Sync {
    /// Whether a valid PIN-verified marker already exists.
    async fn probe(&self) -> Result<bool, PinGatewayError>;

    async fn submit(&self, pin: &str) -> Result<PinVerdict, PinGatewayError>;

    /// Clears the PIN-verified marker.
    async fn clear(&self) -> Result<(), PinGatewayError>;
}
