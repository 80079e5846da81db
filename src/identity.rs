//! Identity provider seam.
//!
//! The provider owns sign-in and sign-out; the gate only holds a read-only copy
//! of the current [`UserIdentity`]. Auth-state changes reach the gate through
//! `AuthGate::on_identity_changed`, which is the callback contract any provider
//! subscription must invoke.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

impl UserIdentity {
    #[must_use]
    pub fn new(uid: &str, email: &str, display_name: &str) -> Self {
        Self {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            photo_url: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Unauthorized domain for Google Sign-In. Add this domain to the provider's authorized domains.")]
    UnauthorizedDomain,
    #[error("Unable to sign in with Google.")]
    Provider(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Runs the interactive sign-in and returns the resulting identity.
    async fn sign_in(&self) -> Result<UserIdentity, IdentityError>;

    /// Signs the current identity out. Idempotent.
    async fn sign_out(&self) -> Result<(), IdentityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_serializes_camel_case() -> anyhow::Result<()> {
        let identity = UserIdentity::new("uid-1", "owner@example.com", "Owner");
        let json = serde_json::to_value(&identity)?;
        assert_eq!(json["displayName"], "Owner");
        assert!(json["photoUrl"].is_null());
        Ok(())
    }

    #[test]
    fn provider_error_hides_details() {
        let err = IdentityError::Provider("popup closed by user".to_string());
        assert_eq!(err.to_string(), "Unable to sign in with Google.");
    }
}
