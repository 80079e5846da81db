//! PIN-gateway check for directory routes.
//!
//! Flow Overview: forward the caller's cookies to the PIN gateway probe and
//! let the request through only when the gateway recognizes its marker.

use axum::{
    http::{header::COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::{debug, error};

use super::ErrorBody;
use crate::{api::AppState, gate::messages};

/// Returns the response to send instead of the listing when the caller has not
/// passed the PIN stage.
pub async fn require_pin(headers: &HeaderMap, state: &AppState) -> Result<(), Response> {
    let denied = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new(messages::PIN_REQUIRED)),
        )
            .into_response()
    };

    // No cookies means no marker; the gateway is not asked.
    let Some(cookies) = headers.get(COOKIE).and_then(|value| value.to_str().ok()) else {
        return Err(denied());
    };

    match state.pin.probe_as(cookies).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            debug!("PIN marker missing or expired");
            Err(denied())
        }
        Err(err) => {
            error!(error = %err, "unable to reach PIN gateway");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody::new(messages::PIN_UNAVAILABLE)),
            )
                .into_response())
        }
    }
}
