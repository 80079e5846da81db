//! Opaque per-login session token.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// 32 random bytes, 256 bits of entropy.
const TOKEN_BYTES: usize = 32;

/// Local proof of an active browser session, independent of PIN state.
#[derive(Clone)]
pub struct SessionToken(SecretString);

impl SessionToken {
    /// Mint a URL-safe token from the OS CSPRNG.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn mint() -> Result<Self> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate session token")?;
        Ok(Self(SecretString::from(Base64UrlUnpadded::encode_string(&bytes))))
    }

    /// Wrap a token read back from storage. Empty values are not tokens.
    #[must_use]
    pub fn from_stored(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(SecretString::from(trimmed.to_string())))
        }
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("SessionToken([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_token_is_url_safe_and_full_length() -> Result<()> {
        let token = SessionToken::mint()?;
        // 32 bytes -> 43 unpadded base64 characters
        assert_eq!(token.expose().len(), 43);
        assert!(token
            .expose()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        let decoded = Base64UrlUnpadded::decode_vec(token.expose())
            .map_err(|err| anyhow::anyhow!("decode failed: {err}"))?;
        assert_eq!(decoded.len(), TOKEN_BYTES);
        Ok(())
    }

    #[test]
    fn minted_tokens_differ() -> Result<()> {
        let first = SessionToken::mint()?;
        let second = SessionToken::mint()?;
        assert!(!first.matches(&second));
        Ok(())
    }

    #[test]
    fn from_stored_rejects_blank() {
        assert!(SessionToken::from_stored("").is_none());
        assert!(SessionToken::from_stored("   ").is_none());
        assert!(SessionToken::from_stored("abc").is_some());
    }

    #[test]
    fn debug_redacts() -> Result<()> {
        let token = SessionToken::mint()?;
        let rendered = format!("{token:?}");
        assert!(!rendered.contains(token.expose()));
        Ok(())
    }
}
