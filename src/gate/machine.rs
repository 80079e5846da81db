//! Pure auth gate state machine.
//!
//! [`GateMachine::handle`] applies one event and returns the effects to run,
//! in order. Effects that complete asynchronously come back as events that
//! carry the uid they were issued for; if the identity changed in between, the
//! result is dropped.

use tracing::{debug, error, warn};

use super::{
    error::{
        GateError, ACCESS_REVOKED, ACCOUNT_BLOCKED, BLOCK_CHECK_FAILED, BLOCK_FAILED,
        INCORRECT_PIN, NOT_AUTHORIZED, PIN_REQUIRED, PIN_UNAVAILABLE, SIGN_IN_REQUIRED,
        SIGN_OUT_FAILED,
    },
    ui::Notice,
};
use crate::{
    config::{BlockCheckPolicy, GateConfig},
    identity::{IdentityError, UserIdentity},
    pin::{PinGatewayError, PinVerdict},
    session::SessionToken,
    store::{BlockRecord, LoginEntry, StoreError},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatePhase {
    Unauthenticated,
    /// Interactive sign-in running.
    IdentityPending,
    /// Provider returned a principal that is not allow-listed.
    IdentityRejected,
    /// Block-list lookup outstanding.
    BlockedCheck,
    Blocked,
    /// PIN cookie probe outstanding; the UI shows a neutral loading state.
    PinCheck,
    PinPending,
    PinFailed { attempts: u32 },
    SessionActive,
    SignedOut,
    RemoteExpired,
    CrossTabLoggedOut,
}

impl GatePhase {
    /// Phases that only make sense while an identity is present.
    fn needs_identity(self) -> bool {
        matches!(
            self,
            Self::BlockedCheck
                | Self::PinCheck
                | Self::PinPending
                | Self::PinFailed { .. }
                | Self::SessionActive
        )
    }
}

#[derive(Clone, Debug)]
pub enum GateEvent {
    /// Provider auth-state callback.
    IdentityChanged(Option<UserIdentity>),
    SignInStarted,
    SignInSucceeded(UserIdentity),
    SignInFailed(IdentityError),
    SignOutRequested,
    SignOutFailed(IdentityError),
    TokenIssued(SessionToken),
    /// Storage change made by another tab; `None` means the token was removed.
    TokenChanged(Option<SessionToken>),
    BlockCheckCompleted {
        uid: String,
        result: Result<bool, StoreError>,
    },
    BlockWriteCompleted {
        uid: String,
        result: Result<(), StoreError>,
    },
    PinProbeCompleted {
        uid: String,
        result: Result<bool, PinGatewayError>,
    },
    PinSubmitted,
    PinVerdictReceived {
        uid: String,
        result: Result<PinVerdict, PinGatewayError>,
    },
    RouteEntered(String),
    DataPermissionDenied,
    TeardownFinished,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateCommand {
    /// Mint, persist and announce a fresh session token.
    IssueToken,
    /// Remove the stored token and announce it if one was present.
    ClearToken,
    SignOut,
    CheckBlockList { uid: String },
    /// Fire-and-forget audit write.
    RecordLogin(LoginEntry),
    ProbePin { uid: String },
    SubmitPin { uid: String, pin: String },
    WriteBlock(BlockRecord),
    ClearPinCookie,
    Alert(Notice),
    Navigate(String),
    FinishTeardown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Teardown {
    SignOut,
    RemoteExpiry,
    RouteLogout,
    PermissionDenied,
}

#[derive(Debug)]
pub struct GateMachine {
    config: GateConfig,
    phase: GatePhase,
    identity: Option<UserIdentity>,
    session_token: Option<SessionToken>,
    pin_verified: bool,
    is_blocked: bool,
    pin_attempts: u32,
    pin_input: String,
    auth_ready: bool,
    pin_check_ready: bool,
    checking_blocked: bool,
    pin_checking: bool,
    pin_locked: bool,
    teardown: Option<Teardown>,
    auth_error: Option<GateError>,
    pin_error: Option<GateError>,
    last_path: Option<String>,
}

impl GateMachine {
    /// `stored_token` is whatever the session storage held at startup.
    #[must_use]
    pub fn new(config: GateConfig, stored_token: Option<SessionToken>) -> Self {
        Self {
            config,
            phase: GatePhase::Unauthenticated,
            identity: None,
            session_token: stored_token,
            pin_verified: false,
            is_blocked: false,
            pin_attempts: 0,
            pin_input: String::new(),
            auth_ready: false,
            pin_check_ready: false,
            checking_blocked: false,
            pin_checking: false,
            pin_locked: false,
            teardown: None,
            auth_error: None,
            pin_error: None,
            last_path: None,
        }
    }

    /// Computed on every call, never cached.
    #[must_use]
    pub fn has_access(&self) -> bool {
        self.identity.is_some()
            && self.pin_verified
            && self.session_token.is_some()
            && !self.is_blocked
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    #[must_use]
    pub fn identity(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn session_token(&self) -> Option<&SessionToken> {
        self.session_token.as_ref()
    }

    #[must_use]
    pub fn pin_verified(&self) -> bool {
        self.pin_verified
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.is_blocked
    }

    #[must_use]
    pub fn pin_attempts(&self) -> u32 {
        self.pin_attempts
    }

    #[must_use]
    pub fn pin_input(&self) -> &str {
        &self.pin_input
    }

    /// The provider has reported auth state at least once.
    #[must_use]
    pub fn auth_ready(&self) -> bool {
        self.auth_ready
    }

    /// False while a PIN cookie probe is outstanding.
    #[must_use]
    pub fn pin_check_ready(&self) -> bool {
        self.pin_check_ready
    }

    #[must_use]
    pub fn checking_blocked(&self) -> bool {
        self.checking_blocked
    }

    #[must_use]
    pub fn pin_checking(&self) -> bool {
        self.pin_checking
    }

    #[must_use]
    pub fn auth_error(&self) -> Option<&GateError> {
        self.auth_error.as_ref()
    }

    #[must_use]
    pub fn pin_error(&self) -> Option<&GateError> {
        self.pin_error.as_ref()
    }

    #[must_use]
    pub fn last_path(&self) -> Option<&str> {
        self.last_path.as_deref()
    }

    pub fn set_pin_input(&mut self, value: &str) {
        self.pin_input = value.to_string();
    }

    pub fn handle(&mut self, event: GateEvent) -> Vec<GateCommand> {
        let commands = match event {
            GateEvent::IdentityChanged(identity) => self.on_identity(identity),
            GateEvent::SignInStarted => {
                self.auth_error = None;
                self.pin_error = None;
                self.pin_verified = false;
                self.phase = GatePhase::IdentityPending;
                Vec::new()
            }
            GateEvent::SignInSucceeded(identity) => {
                if self.config.is_allowed(&identity.email) {
                    vec![
                        GateCommand::IssueToken,
                        GateCommand::Alert(Notice::PinRequired),
                    ]
                } else {
                    Vec::new()
                }
            }
            GateEvent::SignInFailed(err) => {
                self.auth_error = Some(GateError::Authorization(err.to_string()));
                self.phase = GatePhase::Unauthenticated;
                Vec::new()
            }
            GateEvent::SignOutRequested => self.on_sign_out_requested(),
            GateEvent::SignOutFailed(err) => {
                warn!(error = %err, "identity sign-out failed");
                self.auth_error = Some(GateError::transport(SIGN_OUT_FAILED));
                if self.teardown == Some(Teardown::SignOut) {
                    self.teardown = None;
                }
                Vec::new()
            }
            GateEvent::TokenIssued(token) => {
                self.session_token = Some(token);
                Vec::new()
            }
            GateEvent::TokenChanged(token) => self.on_token_changed(token),
            GateEvent::BlockCheckCompleted { uid, result } => {
                if self.is_stale(&uid) {
                    debug!(uid, "dropping stale block check");
                    return Vec::new();
                }
                self.on_block_check(result)
            }
            GateEvent::BlockWriteCompleted { uid, result } => {
                if self.is_stale(&uid) {
                    debug!(uid, "dropping stale block write");
                    return Vec::new();
                }
                self.on_block_write(result)
            }
            GateEvent::PinProbeCompleted { uid, result } => {
                if self.is_stale(&uid) {
                    debug!(uid, "dropping stale PIN probe");
                    return Vec::new();
                }
                self.pin_check_ready = true;
                match result {
                    Ok(true) => {
                        self.pin_verified = true;
                        self.pin_error = None;
                    }
                    Ok(false) => {}
                    Err(err) => error!(error = %err, "unable to verify PIN cookie"),
                }
                Vec::new()
            }
            GateEvent::PinSubmitted => self.on_pin_submitted(),
            GateEvent::PinVerdictReceived { uid, result } => {
                if self.is_stale(&uid) || !self.pin_checking {
                    debug!(uid, "dropping stale PIN verdict");
                    return Vec::new();
                }
                self.on_pin_verdict(result)
            }
            GateEvent::RouteEntered(path) => self.on_route(path),
            GateEvent::DataPermissionDenied => self.on_permission_denied(),
            GateEvent::TeardownFinished => {
                if self.teardown.take() == Some(Teardown::SignOut) {
                    self.reset_pin_state();
                }
                Vec::new()
            }
        };
        self.settle_phase();
        commands
    }

    fn is_stale(&self, uid: &str) -> bool {
        self.identity.as_ref().map_or(true, |identity| identity.uid != uid)
    }

    fn reset_pin_state(&mut self) {
        self.pin_verified = false;
        self.pin_input.clear();
        self.pin_error = None;
        self.pin_attempts = 0;
    }

    /// Drops the in-memory token; only emits a storage clear when one was held.
    fn clear_token(&mut self, commands: &mut Vec<GateCommand>) {
        if self.session_token.take().is_some() {
            commands.push(GateCommand::ClearToken);
        }
    }

    fn on_identity(&mut self, identity: Option<UserIdentity>) -> Vec<GateCommand> {
        self.auth_ready = true;
        let mut commands = Vec::new();

        let Some(identity) = identity else {
            self.identity = None;
            self.reset_pin_state();
            self.is_blocked = false;
            self.checking_blocked = false;
            self.pin_checking = false;
            self.pin_locked = false;
            self.pin_check_ready = true;
            self.clear_token(&mut commands);
            return commands;
        };

        if self
            .identity
            .as_ref()
            .is_some_and(|current| current.uid == identity.uid)
        {
            return commands;
        }

        if !self.config.is_allowed(&identity.email) {
            warn!(uid = identity.uid, "rejecting identity outside the allow list");
            self.identity = None;
            self.auth_error = Some(GateError::authorization(NOT_AUTHORIZED));
            self.pin_verified = false;
            self.pin_input.clear();
            self.pin_error = None;
            self.pin_check_ready = true;
            self.clear_token(&mut commands);
            commands.push(GateCommand::SignOut);
            self.phase = GatePhase::IdentityRejected;
            return commands;
        }

        let uid = identity.uid.clone();
        self.identity = Some(identity);
        self.reset_pin_state();
        self.is_blocked = false;
        self.pin_locked = false;
        self.pin_checking = false;
        self.checking_blocked = true;
        self.pin_check_ready = false;
        if self.session_token.is_none() {
            commands.push(GateCommand::IssueToken);
        }
        commands.push(GateCommand::CheckBlockList { uid });
        commands
    }

    fn on_sign_out_requested(&mut self) -> Vec<GateCommand> {
        self.auth_error = None;
        self.teardown = Some(Teardown::SignOut);
        self.phase = GatePhase::SignedOut;
        let mut commands = vec![GateCommand::ClearPinCookie];
        self.clear_token(&mut commands);
        commands.push(GateCommand::SignOut);
        commands.push(GateCommand::FinishTeardown);
        commands
    }

    fn on_token_changed(&mut self, token: Option<SessionToken>) -> Vec<GateCommand> {
        if token.is_some() {
            self.session_token = token;
            return Vec::new();
        }
        if self.session_token.take().is_none() && self.identity.is_none() {
            return Vec::new();
        }
        if self.teardown.is_some() {
            return Vec::new();
        }

        self.reset_pin_state();
        if self.identity.is_none() {
            self.phase = GatePhase::CrossTabLoggedOut;
            return vec![GateCommand::Navigate(self.config.entry_route().to_string())];
        }

        self.teardown = Some(Teardown::RemoteExpiry);
        self.phase = GatePhase::RemoteExpired;
        vec![
            GateCommand::Alert(Notice::SessionExpired),
            GateCommand::Navigate(self.config.entry_route().to_string()),
            GateCommand::ClearPinCookie,
            GateCommand::SignOut,
            GateCommand::Navigate(self.config.landing_route().to_string()),
            GateCommand::FinishTeardown,
        ]
    }

    fn on_block_check(&mut self, result: Result<bool, StoreError>) -> Vec<GateCommand> {
        self.checking_blocked = false;
        let Some(identity) = self.identity.as_ref() else {
            return Vec::new();
        };
        let uid = identity.uid.clone();
        let entry = LoginEntry::from(identity);

        match result {
            Ok(true) => {
                self.is_blocked = true;
                self.pin_check_ready = true;
                self.auth_error = Some(GateError::authorization(ACCOUNT_BLOCKED));
                let mut commands = vec![
                    GateCommand::Alert(Notice::AccountBlocked),
                    GateCommand::ClearPinCookie,
                ];
                self.clear_token(&mut commands);
                commands.push(GateCommand::SignOut);
                commands
            }
            Ok(false) => {
                self.is_blocked = false;
                vec![
                    GateCommand::RecordLogin(entry),
                    GateCommand::ProbePin { uid },
                ]
            }
            Err(err) => {
                error!(error = %err, uid, "block check failed");
                match self.config.block_check_policy() {
                    BlockCheckPolicy::FailOpen => vec![GateCommand::ProbePin { uid }],
                    BlockCheckPolicy::FailClosed => {
                        self.pin_check_ready = true;
                        self.pin_locked = true;
                        self.auth_error = Some(GateError::transport(BLOCK_CHECK_FAILED));
                        let mut commands = Vec::new();
                        self.clear_token(&mut commands);
                        commands.push(GateCommand::SignOut);
                        commands
                    }
                }
            }
        }
    }

    fn on_pin_submitted(&mut self) -> Vec<GateCommand> {
        let Some(uid) = self.identity.as_ref().map(|identity| identity.uid.clone()) else {
            self.pin_error = Some(GateError::authorization(SIGN_IN_REQUIRED));
            return Vec::new();
        };
        if self.is_blocked || self.checking_blocked || self.pin_locked {
            self.pin_error = Some(GateError::authorization(ACCOUNT_BLOCKED));
            return Vec::new();
        }
        if self.pin_checking {
            return Vec::new();
        }

        let pin = self.pin_input.trim().to_string();
        if pin.is_empty() {
            self.pin_error = Some(GateError::validation(PIN_REQUIRED));
            self.pin_verified = false;
            return Vec::new();
        }

        self.pin_checking = true;
        vec![GateCommand::SubmitPin { uid, pin }]
    }

    fn on_pin_verdict(
        &mut self,
        result: Result<PinVerdict, PinGatewayError>,
    ) -> Vec<GateCommand> {
        self.pin_checking = false;
        match result {
            Ok(PinVerdict::Verified) => {
                self.pin_error = None;
                self.pin_verified = true;
                self.pin_attempts = 0;
                Vec::new()
            }
            Ok(PinVerdict::Rejected { message }) => {
                self.pin_verified = false;
                self.pin_attempts += 1;
                self.pin_error = Some(GateError::Rejected {
                    message: message.unwrap_or_else(|| INCORRECT_PIN.to_string()),
                    attempts: self.pin_attempts,
                });

                let max = self.config.max_pin_attempts();
                match self.identity.as_ref() {
                    Some(identity) if self.pin_attempts >= max => {
                        warn!(uid = identity.uid, attempts = self.pin_attempts, "PIN attempts exhausted");
                        self.pin_locked = true;
                        let reason = format!("PIN entered incorrectly {max} times.");
                        vec![GateCommand::WriteBlock(BlockRecord::for_identity(
                            identity, &reason,
                        ))]
                    }
                    _ => Vec::new(),
                }
            }
            Err(err) => {
                error!(error = %err, "PIN verification failed");
                self.pin_error = Some(GateError::transport(PIN_UNAVAILABLE));
                self.pin_verified = false;
                Vec::new()
            }
        }
    }

    fn on_block_write(&mut self, result: Result<(), StoreError>) -> Vec<GateCommand> {
        let mut commands = Vec::new();
        match result {
            Ok(()) => {
                self.is_blocked = true;
                self.auth_error = Some(GateError::authorization(ACCOUNT_BLOCKED));
                commands.push(GateCommand::Alert(Notice::AccountBlocked));
            }
            Err(err) => {
                error!(error = %err, "failed to block user");
                self.auth_error = Some(GateError::transport(BLOCK_FAILED));
            }
        }
        commands.push(GateCommand::ClearPinCookie);
        self.clear_token(&mut commands);
        commands.push(GateCommand::SignOut);
        commands
    }

    fn on_route(&mut self, path: String) -> Vec<GateCommand> {
        let previous = self.last_path.replace(path.clone());
        if path != self.config.entry_route() {
            return Vec::new();
        }
        if self.identity.is_none() && self.session_token.is_none() {
            return Vec::new();
        }
        if self.teardown.is_some() || !self.config.forces_logout_from(previous.as_deref()) {
            return Vec::new();
        }

        self.teardown = Some(Teardown::RouteLogout);
        self.phase = GatePhase::SignedOut;
        self.reset_pin_state();
        let mut commands = vec![GateCommand::ClearPinCookie];
        self.clear_token(&mut commands);
        commands.push(GateCommand::SignOut);
        commands.push(GateCommand::FinishTeardown);
        commands
    }

    fn on_permission_denied(&mut self) -> Vec<GateCommand> {
        if self.teardown.is_some()
            || (self.identity.is_none() && self.session_token.is_none())
        {
            return Vec::new();
        }

        warn!("data store denied access, ending session");
        self.teardown = Some(Teardown::PermissionDenied);
        self.phase = GatePhase::SignedOut;
        self.auth_error = Some(GateError::Permission(ACCESS_REVOKED.to_string()));
        self.reset_pin_state();
        let mut commands = vec![GateCommand::ClearPinCookie];
        self.clear_token(&mut commands);
        commands.push(GateCommand::SignOut);
        commands.push(GateCommand::Navigate(self.config.entry_route().to_string()));
        commands.push(GateCommand::FinishTeardown);
        commands
    }

    /// Keeps the phase consistent with the flags: `SessionActive` exactly when
    /// `has_access()` holds.
    fn settle_phase(&mut self) {
        if self.has_access() {
            self.phase = GatePhase::SessionActive;
            return;
        }
        if self.teardown.is_some() && self.phase != GatePhase::SessionActive {
            return;
        }
        self.phase = match self.identity {
            Some(_) if self.is_blocked => GatePhase::Blocked,
            Some(_) if self.checking_blocked => GatePhase::BlockedCheck,
            Some(_) if !self.pin_check_ready => GatePhase::PinCheck,
            Some(_) if self.pin_attempts > 0 => GatePhase::PinFailed {
                attempts: self.pin_attempts,
            },
            Some(_) => GatePhase::PinPending,
            None if self.phase.needs_identity() => GatePhase::Unauthenticated,
            None => self.phase,
        };
    }
}
