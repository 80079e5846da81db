//! Gate configuration. Values are resolved once when a host opens its gates
//! (builder or environment) and never mutated afterwards.
//!
//! Configuration values are not secrets. PIN verification lives behind the
//! PIN gateway, so no PIN hash or salt is ever part of this struct.

use anyhow::{anyhow, Context, Result};
use std::{env::var, str::FromStr};

const DEFAULT_MAX_PIN_ATTEMPTS: u32 = 3;
const DEFAULT_ENTRY_ROUTE: &str = "/";
const DEFAULT_LANDING_ROUTE: &str = "/page";

pub const ENV_ALLOWED_EMAIL: &str = "DIRGATE_ALLOWED_EMAIL";
pub const ENV_MAX_PIN_ATTEMPTS: &str = "DIRGATE_MAX_PIN_ATTEMPTS";
pub const ENV_BLOCK_CHECK_POLICY: &str = "DIRGATE_BLOCK_CHECK_POLICY";
pub const ENV_ENTRY_ROUTE: &str = "DIRGATE_ENTRY_ROUTE";
pub const ENV_LANDING_ROUTE: &str = "DIRGATE_LANDING_ROUTE";
pub const ENV_LOGOUT_SOURCES: &str = "DIRGATE_LOGOUT_SOURCES";

/// What the gate does when the block-list lookup itself fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlockCheckPolicy {
    /// Proceed to the PIN stage without a login audit entry.
    FailOpen,
    /// Surface a transport error and sign the identity out.
    #[default]
    FailClosed,
}

impl FromStr for BlockCheckPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "open" | "fail-open" | "fail_open" => Ok(Self::FailOpen),
            "closed" | "fail-closed" | "fail_closed" => Ok(Self::FailClosed),
            other => Err(anyhow!("invalid block check policy: {other}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GateConfig {
    allowed_email: String,
    max_pin_attempts: u32,
    block_check_policy: BlockCheckPolicy,
    entry_route: String,
    landing_route: String,
    logout_sources: Vec<String>,
}

impl GateConfig {
    #[must_use]
    pub fn new(allowed_email: &str) -> Self {
        Self {
            allowed_email: normalize_email(allowed_email),
            max_pin_attempts: DEFAULT_MAX_PIN_ATTEMPTS,
            block_check_policy: BlockCheckPolicy::default(),
            entry_route: DEFAULT_ENTRY_ROUTE.to_string(),
            landing_route: DEFAULT_LANDING_ROUTE.to_string(),
            logout_sources: Vec::new(),
        }
    }

    /// Builds the config from `DIRGATE_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if the allowed e-mail is missing or a value fails to parse.
    pub fn from_env() -> Result<Self> {
        let allowed_email = read_env(ENV_ALLOWED_EMAIL)
            .with_context(|| format!("{ENV_ALLOWED_EMAIL} must be set"))?;
        let mut config = Self::new(&allowed_email);

        if let Some(attempts) = read_env(ENV_MAX_PIN_ATTEMPTS) {
            let attempts = attempts
                .parse::<u32>()
                .with_context(|| format!("invalid {ENV_MAX_PIN_ATTEMPTS}: {attempts}"))?;
            config = config.with_max_pin_attempts(attempts);
        }
        if let Some(policy) = read_env(ENV_BLOCK_CHECK_POLICY) {
            config = config.with_block_check_policy(policy.parse()?);
        }
        if let Some(route) = read_env(ENV_ENTRY_ROUTE) {
            config = config.with_entry_route(route);
        }
        if let Some(route) = read_env(ENV_LANDING_ROUTE) {
            config = config.with_landing_route(route);
        }
        if let Some(sources) = read_env(ENV_LOGOUT_SOURCES) {
            config = config.with_logout_sources(
                sources
                    .split(',')
                    .map(str::trim)
                    .filter(|source| !source.is_empty())
                    .map(ToString::to_string)
                    .collect(),
            );
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_max_pin_attempts(mut self, attempts: u32) -> Self {
        // At least one attempt is always allowed.
        self.max_pin_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_block_check_policy(mut self, policy: BlockCheckPolicy) -> Self {
        self.block_check_policy = policy;
        self
    }

    #[must_use]
    pub fn with_entry_route(mut self, route: String) -> Self {
        self.entry_route = route;
        self
    }

    #[must_use]
    pub fn with_landing_route(mut self, route: String) -> Self {
        self.landing_route = route;
        self
    }

    #[must_use]
    pub fn with_logout_sources(mut self, sources: Vec<String>) -> Self {
        self.logout_sources = sources;
        self
    }

    #[must_use]
    pub fn allowed_email(&self) -> &str {
        &self.allowed_email
    }

    /// Case-insensitive match against the single allow-listed principal.
    #[must_use]
    pub fn is_allowed(&self, email: &str) -> bool {
        !self.allowed_email.is_empty() && normalize_email(email) == self.allowed_email
    }

    #[must_use]
    pub fn max_pin_attempts(&self) -> u32 {
        self.max_pin_attempts
    }

    #[must_use]
    pub fn block_check_policy(&self) -> BlockCheckPolicy {
        self.block_check_policy
    }

    #[must_use]
    pub fn entry_route(&self) -> &str {
        &self.entry_route
    }

    #[must_use]
    pub fn landing_route(&self) -> &str {
        &self.landing_route
    }

    /// Whether arriving at the entry route from `previous` forces a logout.
    /// With no configured sources every arrival does.
    #[must_use]
    pub fn forces_logout_from(&self, previous: Option<&str>) -> bool {
        if self.logout_sources.is_empty() {
            return true;
        }
        previous.is_some_and(|path| self.logout_sources.iter().any(|source| source == path))
    }
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn read_env(key: &str) -> Option<String> {
    let value = var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
