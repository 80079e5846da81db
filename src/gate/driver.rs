//! Async driver for [`GateMachine`]: one instance per tab.

use std::{collections::VecDeque, sync::Arc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::{
    machine::{GateCommand, GateEvent, GateMachine},
    ui::GateUi,
};
use crate::{
    config::GateConfig,
    identity::{IdentityProvider, UserIdentity},
    pin::PinGateway,
    session::{SessionChannel, SessionListener, SessionSignal, SessionStore, SessionToken, SignalKind, TabId},
    store::{BlockList, LoginAudit},
};

/// Adapters the gate talks to. Cheap to clone; tabs of one browser profile
/// share `sessions` and `channel`.
#[derive(Clone)]
pub struct GateDeps {
    pub identity: Arc<dyn IdentityProvider>,
    pub pin: Arc<dyn PinGateway>,
    pub block_list: Arc<dyn BlockList>,
    pub audit: Arc<dyn LoginAudit>,
    pub sessions: Arc<dyn SessionStore>,
    pub channel: SessionChannel,
    pub ui: Arc<dyn GateUi>,
}

pub struct AuthGate {
    tab: TabId,
    machine: GateMachine,
    deps: GateDeps,
    listener: SessionListener,
    background: JoinSet<()>,
}

impl AuthGate {
    /// Opens a gate for a new tab, adopting whatever token storage holds.
    #[must_use]
    pub fn new(config: GateConfig, deps: GateDeps) -> Self {
        let tab = TabId::new();
        let listener = deps.channel.subscribe(tab);
        let stored = deps.sessions.read().unwrap_or_else(|err| {
            warn!(error = %err, "unable to read session token");
            None
        });
        Self {
            tab,
            machine: GateMachine::new(config, stored),
            deps,
            listener,
            background: JoinSet::new(),
        }
    }

    #[must_use]
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Read-only view of the gate state.
    #[must_use]
    pub fn state(&self) -> &GateMachine {
        &self.machine
    }

    #[must_use]
    pub fn has_access(&self) -> bool {
        self.machine.has_access()
    }

    /// Interactive sign-in. Failures are kept in `auth_error`, never returned.
    #[instrument(skip(self), fields(tab = %self.tab))]
    pub async fn sign_in(&mut self) {
        self.dispatch(GateEvent::SignInStarted).await;
        match self.deps.identity.sign_in().await {
            Ok(identity) => {
                self.dispatch(GateEvent::SignInSucceeded(identity.clone()))
                    .await;
                self.dispatch(GateEvent::IdentityChanged(Some(identity)))
                    .await;
            }
            Err(err) => {
                error!(error = ?err, "sign-in failed");
                self.dispatch(GateEvent::SignInFailed(err)).await;
            }
        }
    }

    #[instrument(skip(self), fields(tab = %self.tab))]
    pub async fn sign_out(&mut self) {
        self.dispatch(GateEvent::SignOutRequested).await;
    }

    /// Auth-state subscription callback for identity providers.
    pub async fn on_identity_changed(&mut self, identity: Option<UserIdentity>) {
        self.dispatch(GateEvent::IdentityChanged(identity)).await;
    }

    pub fn set_pin_input(&mut self, value: &str) {
        self.machine.set_pin_input(value);
    }

    #[instrument(skip(self), fields(tab = %self.tab))]
    pub async fn submit_pin(&mut self) {
        self.dispatch(GateEvent::PinSubmitted).await;
    }

    /// Route tracking; the host calls this on every navigation.
    pub async fn enter_route(&mut self, path: &str) {
        self.dispatch(GateEvent::RouteEntered(path.to_string()))
            .await;
    }

    /// Reacts to a storage change announced by another tab.
    ///
    /// An invalidation always tears this tab down, even if storage already
    /// holds a newer token by the time the signal is handled.
    pub async fn handle_signal(&mut self, signal: SessionSignal) {
        if signal.origin == self.tab {
            return;
        }
        let token = match signal.kind {
            SignalKind::Invalidated => None,
            SignalKind::Issued => match self.deps.sessions.read() {
                Ok(token) => token,
                Err(err) => {
                    warn!(error = %err, "unable to read session token after issue signal");
                    return;
                }
            },
        };
        debug!(origin = %signal.origin, kind = ?signal.kind, present = token.is_some(), "session signal");
        self.dispatch(GateEvent::TokenChanged(token)).await;
    }

    /// Handles every signal already delivered to this tab; returns how many.
    pub async fn poll_signals(&mut self) -> usize {
        let mut handled = 0;
        while let Some(signal) = self.listener.try_recv() {
            self.handle_signal(signal).await;
            handled += 1;
        }
        handled
    }

    /// Waits for the next signal from another tab and handles it. Returns
    /// `false` once the channel is closed.
    pub async fn next_signal(&mut self) -> bool {
        match self.listener.recv().await {
            Some(signal) => {
                self.handle_signal(signal).await;
                true
            }
            None => false,
        }
    }

    /// Data-loading boundary reports a denied read.
    pub async fn report_permission_denied(&mut self) {
        self.dispatch(GateEvent::DataPermissionDenied).await;
    }

    /// Waits for fire-and-forget writes (login audit) to finish.
    pub async fn settle(&mut self) {
        while let Some(result) = self.background.join_next().await {
            if let Err(err) = result {
                error!(error = %err, "background gate task failed");
            }
        }
    }

    /// Runs an event and everything it triggers. A completion is handled as
    /// soon as its effect resolves, ahead of the rest of the batch.
    async fn dispatch(&mut self, event: GateEvent) {
        let mut pending: VecDeque<GateCommand> = self.machine.handle(event).into();
        while let Some(command) = pending.pop_front() {
            if let Some(follow_up) = self.execute(command).await {
                for command in self.machine.handle(follow_up).into_iter().rev() {
                    pending.push_front(command);
                }
            }
        }
    }

    async fn execute(&mut self, command: GateCommand) -> Option<GateEvent> {
        match command {
            GateCommand::IssueToken => match SessionToken::mint() {
                Ok(token) => {
                    if let Err(err) = self.deps.sessions.write(&token) {
                        warn!(error = %err, "unable to persist session token");
                    }
                    self.deps.channel.publish(self.tab, SignalKind::Issued);
                    info!(tab = %self.tab, "session token issued");
                    Some(GateEvent::TokenIssued(token))
                }
                Err(err) => {
                    error!(error = ?err, "unable to mint session token");
                    None
                }
            },
            GateCommand::ClearToken => {
                match self.deps.sessions.clear() {
                    Ok(true) => {
                        self.deps.channel.publish(self.tab, SignalKind::Invalidated);
                    }
                    Ok(false) => {}
                    Err(err) => warn!(error = %err, "unable to clear session token"),
                }
                None
            }
            GateCommand::SignOut => match self.deps.identity.sign_out().await {
                Ok(()) => Some(GateEvent::IdentityChanged(None)),
                Err(err) => Some(GateEvent::SignOutFailed(err)),
            },
            GateCommand::CheckBlockList { uid } => {
                let result = self.deps.block_list.is_blocked(&uid).await;
                Some(GateEvent::BlockCheckCompleted { uid, result })
            }
            GateCommand::RecordLogin(entry) => {
                let audit = Arc::clone(&self.deps.audit);
                self.background.spawn(async move {
                    if let Err(err) = audit.record_login(&entry).await {
                        error!(error = %err, uid = entry.uid, "login audit write failed");
                    }
                });
                None
            }
            GateCommand::ProbePin { uid } => {
                let result = self.deps.pin.probe().await;
                Some(GateEvent::PinProbeCompleted { uid, result })
            }
            GateCommand::SubmitPin { uid, pin } => {
                let result = self.deps.pin.submit(&pin).await;
                Some(GateEvent::PinVerdictReceived { uid, result })
            }
            GateCommand::WriteBlock(record) => {
                let result = self.deps.block_list.block(&record).await;
                Some(GateEvent::BlockWriteCompleted {
                    uid: record.uid,
                    result,
                })
            }
            GateCommand::ClearPinCookie => {
                if let Err(err) = self.deps.pin.clear().await {
                    error!(error = %err, "unable to clear PIN cookie");
                }
                None
            }
            GateCommand::Alert(notice) => {
                self.deps.ui.alert(notice);
                None
            }
            GateCommand::Navigate(route) => {
                self.deps.ui.navigate(&route);
                None
            }
            GateCommand::FinishTeardown => Some(GateEvent::TeardownFinished),
        }
    }
}
