use anyhow::Result;
use async_trait::async_trait;
use dirgate::{
    config::GateConfig,
    directory::{DirectoryLoader, PhotoBackfill},
    gate::{messages, AuthGate, GateDeps, GateError, GatePhase, GateUi, LogGateUi, Notice},
    identity::{IdentityError, IdentityProvider, UserIdentity},
    pin::{PinGateway, PinGatewayError, PinVerdict},
    session::{MemorySessionStore, SessionChannel, SessionStore},
    store::{
        Collection, MemoryBlockList, MemoryDirectoryStore, MemoryLoginAudit, RawRecord,
        StoreError,
    },
};
use serde_json::json;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

const OWNER_EMAIL: &str = "owner@example.com";
const PIN: &str = "2468";

struct FakeIdentity {
    identity: UserIdentity,
    sign_outs: AtomicUsize,
}

impl FakeIdentity {
    fn new(email: &str) -> Self {
        Self {
            identity: UserIdentity::new("uid-owner", email, "Owner"),
            sign_outs: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_in(&self) -> Result<UserIdentity, IdentityError> {
        Ok(self.identity.clone())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Gateway with one shared "cookie jar", like tabs of one browser profile.
#[derive(Default)]
struct FakePin {
    verified: AtomicBool,
    submissions: AtomicUsize,
    clears: AtomicUsize,
}

#[async_trait]
impl PinGateway for FakePin {
    async fn probe(&self) -> Result<bool, PinGatewayError> {
        Ok(self.verified.load(Ordering::SeqCst))
    }

    async fn submit(&self, pin: &str) -> Result<PinVerdict, PinGatewayError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if pin == PIN {
            self.verified.store(true, Ordering::SeqCst);
            Ok(PinVerdict::Verified)
        } else {
            Ok(PinVerdict::Rejected { message: None })
        }
    }

    async fn clear(&self) -> Result<(), PinGatewayError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.verified.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum UiEvent {
    Alert(Notice),
    Navigate(String),
}

#[derive(Default)]
struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingUi {
    fn events(&self) -> Vec<UiEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl GateUi for RecordingUi {
    fn alert(&self, notice: Notice) {
        if let Ok(mut events) = self.events.lock() {
            events.push(UiEvent::Alert(notice));
        }
    }

    fn navigate(&self, route: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push(UiEvent::Navigate(route.to_string()));
        }
    }
}

/// One browser profile: shared storage, channel, gateway cookie and stores.
struct Profile {
    identity: Arc<FakeIdentity>,
    pin: Arc<FakePin>,
    block_list: Arc<MemoryBlockList>,
    audit: Arc<MemoryLoginAudit>,
    sessions: Arc<MemorySessionStore>,
    channel: SessionChannel,
}

impl Profile {
    fn new(email: &str) -> Self {
        Self {
            identity: Arc::new(FakeIdentity::new(email)),
            pin: Arc::new(FakePin::default()),
            block_list: Arc::new(MemoryBlockList::new()),
            audit: Arc::new(MemoryLoginAudit::new()),
            sessions: Arc::new(MemorySessionStore::new()),
            channel: SessionChannel::new(),
        }
    }

    fn deps(&self, ui: Arc<dyn GateUi>) -> GateDeps {
        GateDeps {
            identity: self.identity.clone(),
            pin: self.pin.clone(),
            block_list: self.block_list.clone(),
            audit: self.audit.clone(),
            sessions: self.sessions.clone(),
            channel: self.channel.clone(),
            ui,
        }
    }

    fn open_tab(&self) -> (AuthGate, Arc<RecordingUi>) {
        let ui = Arc::new(RecordingUi::default());
        let gate = AuthGate::new(GateConfig::new(OWNER_EMAIL), self.deps(ui.clone()));
        (gate, ui)
    }
}

async fn unlock(gate: &mut AuthGate) {
    gate.sign_in().await;
    gate.set_pin_input(PIN);
    gate.submit_pin().await;
}

#[tokio::test]
async fn sign_in_and_correct_pin_grant_access() -> Result<()> {
    let profile = Profile::new(OWNER_EMAIL);
    let (mut gate, ui) = profile.open_tab();

    gate.sign_in().await;
    assert_eq!(gate.state().phase(), GatePhase::PinPending);
    assert!(profile.sessions.read()?.is_some());
    assert!(gate.state().session_token().is_some());
    assert_eq!(ui.events(), vec![UiEvent::Alert(Notice::PinRequired)]);

    gate.set_pin_input(&format!("  {PIN} "));
    gate.submit_pin().await;
    assert!(gate.has_access());
    assert_eq!(gate.state().phase(), GatePhase::SessionActive);
    assert!(gate.state().pin_error().is_none());

    gate.settle().await;
    let entries = profile.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].email, OWNER_EMAIL);
    Ok(())
}

#[tokio::test]
async fn disallowed_email_is_signed_out_without_token() -> Result<()> {
    let profile = Profile::new("intruder@example.com");
    let (mut gate, _ui) = profile.open_tab();

    gate.sign_in().await;

    assert!(!gate.has_access());
    assert_eq!(gate.state().phase(), GatePhase::IdentityRejected);
    assert!(gate.state().identity().is_none());
    assert_eq!(
        gate.state().auth_error(),
        Some(&GateError::Authorization(messages::NOT_AUTHORIZED.to_string()))
    );
    assert_eq!(profile.identity.sign_outs.load(Ordering::SeqCst), 1);
    assert!(profile.sessions.read()?.is_none());
    assert_eq!(profile.pin.submissions.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn three_rejections_block_once_and_sign_out_once() -> Result<()> {
    let profile = Profile::new(OWNER_EMAIL);
    let (mut gate, ui) = profile.open_tab();
    gate.sign_in().await;

    for attempt in 1..=2 {
        gate.set_pin_input("0000");
        gate.submit_pin().await;
        assert_eq!(gate.state().phase(), GatePhase::PinFailed { attempts: attempt });
        assert_eq!(
            gate.state().pin_error(),
            Some(&GateError::Rejected {
                message: messages::INCORRECT_PIN.to_string(),
                attempts: attempt,
            })
        );
    }

    gate.set_pin_input("1111");
    gate.submit_pin().await;

    assert_eq!(profile.block_list.write_attempts(), 1);
    let record = profile.block_list.get("uid-owner")?;
    assert!(record.is_some_and(|record| record.reason == "PIN entered incorrectly 3 times."));
    assert_eq!(profile.identity.sign_outs.load(Ordering::SeqCst), 1);
    assert_eq!(profile.pin.clears.load(Ordering::SeqCst), 1);
    assert!(profile.sessions.read()?.is_none());
    assert!(!gate.has_access());
    assert_eq!(gate.state().phase(), GatePhase::Blocked);
    assert_eq!(
        gate.state().auth_error(),
        Some(&GateError::Authorization(messages::ACCOUNT_BLOCKED.to_string()))
    );
    assert!(ui.events().contains(&UiEvent::Alert(Notice::AccountBlocked)));

    // Further submissions never reach the gateway.
    gate.set_pin_input(PIN);
    gate.submit_pin().await;
    assert_eq!(profile.pin.submissions.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn blocked_identity_is_rejected_on_next_sign_in() -> Result<()> {
    let profile = Profile::new(OWNER_EMAIL);
    let (mut gate, _ui) = profile.open_tab();
    gate.sign_in().await;
    for _ in 0..3 {
        gate.set_pin_input("0000");
        gate.submit_pin().await;
    }
    assert_eq!(profile.identity.sign_outs.load(Ordering::SeqCst), 1);

    gate.sign_in().await;

    assert!(!gate.has_access());
    assert_eq!(gate.state().phase(), GatePhase::Blocked);
    assert_eq!(profile.identity.sign_outs.load(Ordering::SeqCst), 2);
    assert_eq!(profile.block_list.write_attempts(), 1);
    gate.settle().await;
    // Only the first, unblocked login was audited.
    assert_eq!(profile.audit.entries().len(), 1);
    Ok(())
}

#[tokio::test]
async fn sign_out_in_one_tab_expires_the_other() -> Result<()> {
    let profile = Profile::new(OWNER_EMAIL);
    let (mut first, _first_ui) = profile.open_tab();
    let (mut second, second_ui) = profile.open_tab();

    unlock(&mut first).await;
    assert!(first.has_access());

    // The sibling tab adopts the issued token and the shared PIN cookie.
    assert!(second.next_signal().await);
    second
        .on_identity_changed(Some(profile.identity.identity.clone()))
        .await;
    assert!(second.has_access());

    first.sign_out().await;
    assert!(!first.has_access());
    assert_eq!(first.state().phase(), GatePhase::SignedOut);
    assert!(profile.sessions.read()?.is_none());

    assert_eq!(second.poll_signals().await, 1);
    assert!(!second.has_access());
    assert_eq!(second.state().phase(), GatePhase::RemoteExpired);
    assert!(second.state().identity().is_none());
    assert!(second.state().session_token().is_none());

    let events = second_ui.events();
    assert_eq!(
        events,
        vec![
            UiEvent::Alert(Notice::SessionExpired),
            UiEvent::Navigate("/".to_string()),
            UiEvent::Navigate("/page".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn permission_denied_load_ends_the_session() -> Result<()> {
    let profile = Profile::new(OWNER_EMAIL);
    let (mut gate, ui) = profile.open_tab();
    unlock(&mut gate).await;
    assert!(gate.has_access());

    let directory = Arc::new(MemoryDirectoryStore::new());
    directory.insert(
        Collection::Restaurants,
        vec![RawRecord::new(
            "r1",
            json!({"name": "Corner Cafe", "category": "Cafes", "rating": "4,5"}),
        )],
    )?;
    let loader = DirectoryLoader::new(directory.clone())
        .with_backfill(Arc::new(PhotoBackfill::new(directory.clone())));

    let records = loader.load(&mut gate, &Collection::Restaurants).await?;
    assert_eq!(records.len(), 1);
    assert!((records[0].rating - 4.5).abs() < f64::EPSILON);

    directory.fail_lists(Some(StoreError::PermissionDenied))?;
    let result = loader.load(&mut gate, &Collection::Restaurants).await;

    assert_eq!(
        result.err(),
        Some(GateError::Permission(messages::ACCESS_REVOKED.to_string()))
    );
    assert!(!gate.has_access());
    assert_eq!(gate.state().phase(), GatePhase::SignedOut);
    assert!(profile.sessions.read()?.is_none());
    assert!(ui.events().contains(&UiEvent::Navigate("/".to_string())));

    let again = loader.load(&mut gate, &Collection::Restaurants).await;
    assert_eq!(
        again.err(),
        Some(GateError::Authorization(messages::SIGN_IN_REQUIRED.to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn entry_route_forces_logout() -> Result<()> {
    let profile = Profile::new(OWNER_EMAIL);
    let (mut gate, _ui) = profile.open_tab();
    unlock(&mut gate).await;
    gate.enter_route("/restaurants").await;
    assert!(gate.has_access());

    gate.enter_route("/").await;

    assert!(!gate.has_access());
    assert_eq!(gate.state().phase(), GatePhase::SignedOut);
    assert!(profile.sessions.read()?.is_none());
    assert_eq!(profile.pin.clears.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn relogin_before_sibling_polls_still_expires_it() -> Result<()> {
    let profile = Profile::new(OWNER_EMAIL);
    let (mut first, _first_ui) = profile.open_tab();
    let (mut second, second_ui) = profile.open_tab();

    unlock(&mut first).await;
    assert_eq!(second.poll_signals().await, 1);
    second
        .on_identity_changed(Some(profile.identity.identity.clone()))
        .await;
    assert!(second.has_access());

    // Sign out and back in before the sibling sees either change.
    first.sign_out().await;
    first.sign_in().await;
    assert!(!first.has_access());
    assert!(!first.state().pin_verified());
    let current = profile.sessions.read()?;
    assert!(current.is_some());

    assert_eq!(second.poll_signals().await, 2);
    assert!(!second.has_access());
    assert!(!second.state().pin_verified());
    assert_eq!(second.state().phase(), GatePhase::RemoteExpired);
    assert!(second.state().identity().is_none());
    assert!(second_ui
        .events()
        .contains(&UiEvent::Alert(Notice::SessionExpired)));
    Ok(())
}

#[tokio::test]
async fn headless_tab_runs_the_lockout() -> Result<()> {
    let profile = Profile::new(OWNER_EMAIL);
    let mut gate = AuthGate::new(
        GateConfig::new(OWNER_EMAIL).with_max_pin_attempts(1),
        profile.deps(Arc::new(LogGateUi)),
    );

    gate.sign_in().await;
    gate.set_pin_input("0000");
    gate.submit_pin().await;

    assert_eq!(gate.state().phase(), GatePhase::Blocked);
    assert_eq!(profile.block_list.write_attempts(), 1);
    assert!(profile.sessions.read()?.is_none());
    Ok(())
}
