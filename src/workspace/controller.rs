use super::clipboard::{ClipboardMonitor, ClipboardSource, SharedMemory};
use super::ledger::SolveLedger;
use super::lifecycle::{ContainerLifecycle, NextOutcome};
use super::prober::ReadinessProber;
use super::store::SessionStore;
use super::submission::{FlagSubmission, SubmissionDeps};
use super::timer::{Generation, TaskSlot};
use super::url_sync::{Route, UrlSynchronizer};
use super::{WorkspaceError, WorkspaceEvent};
use crate::client::{DojoApi, ServiceProbe};
use crate::config::{ConfigError, Settings};
use crate::models::{ChallengeRef, PopupAction, Service, SubmissionResult};
use crate::persistence::PreferenceStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// What the dojo last said about the workspace for the active challenge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceStatus {
    pub active: bool,
    pub iframe_src: Option<String>,
    pub error: Option<String>,
    /// Active, but no service URL handed out yet
    pub locating: bool,
}

pub struct Collaborators {
    pub api: Arc<dyn DojoApi>,
    pub probe: Arc<dyn ServiceProbe>,
    pub clipboard: Arc<dyn ClipboardSource>,
    pub preferences: Arc<dyn PreferenceStore>,
}

/// Wires the store, prober, clipboard monitor, submission flow, lifecycle
/// manager and URL synchronizer together and exposes the commands the UI
/// calls.
pub struct WorkspaceController {
    settings: Settings,
    store: SessionStore,
    prober: Arc<ReadinessProber>,
    clipboard: ClipboardMonitor,
    submission: FlagSubmission,
    lifecycle: Arc<ContainerLifecycle>,
    url: UrlSynchronizer,
    ledger: Arc<SolveLedger>,
    events: broadcast::Sender<WorkspaceEvent>,
    api: Arc<dyn DojoApi>,
    status: Arc<watch::Sender<WorkspaceStatus>>,
    locator_slot: TaskSlot,
    probed_for: Mutex<Option<ChallengeRef>>,
}

impl WorkspaceController {
    pub fn new(settings: Settings, deps: Collaborators) -> Result<Self, ConfigError> {
        let grammar = settings.clipboard.grammar()?;
        let store = SessionStore::new(deps.preferences);
        let (events, _) = broadcast::channel(64);
        let memory = SharedMemory::default();
        let ledger = Arc::new(SolveLedger::new());

        let submission = FlagSubmission::new(SubmissionDeps {
            api: Arc::clone(&deps.api),
            store: store.clone(),
            grammar: grammar.clone(),
            debounce: settings.submission.debounce(),
            delays: settings.submission.hide_delays(),
            memory: Arc::clone(&memory),
            ledger: Arc::clone(&ledger),
            events: events.clone(),
        });

        let detected = submission.clone();
        let clipboard = ClipboardMonitor::new(
            deps.clipboard,
            grammar,
            memory,
            settings.clipboard.poll_interval(),
            settings.clipboard.copy_check_delay(),
            Arc::new(move |flag: String| detected.on_clipboard_flag(flag)),
        );
        let open_popup = submission.clone();
        clipboard.set_filter(Arc::new(move |_: &str| !open_popup.popup_visible()));

        let lifecycle = Arc::new(ContainerLifecycle::new(
            Arc::clone(&deps.api),
            store.clone(),
            events.clone(),
            settings.lifecycle.start_timeout(),
        ));
        let url = UrlSynchronizer::new(store.clone(), Arc::clone(&deps.api), events.clone());
        let prober = Arc::new(ReadinessProber::new(deps.probe, settings.readiness.clone()));
        let (status, _) = watch::channel(WorkspaceStatus::default());

        Ok(Self {
            settings,
            store,
            prober,
            clipboard,
            submission,
            lifecycle,
            url,
            ledger,
            events,
            api: deps.api,
            status: Arc::new(status),
            locator_slot: TaskSlot::new(),
            probed_for: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn prober(&self) -> &ReadinessProber {
        &self.prober
    }

    pub fn clipboard(&self) -> &ClipboardMonitor {
        &self.clipboard
    }

    pub fn submission(&self) -> &FlagSubmission {
        &self.submission
    }

    pub fn ledger(&self) -> &SolveLedger {
        &self.ledger
    }

    pub fn url(&self) -> &UrlSynchronizer {
        &self.url
    }

    pub fn status(&self) -> WorkspaceStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.events.subscribe()
    }

    pub fn login_url(&self) -> String {
        format!("{}/login", self.settings.server.origin())
    }

    /// Pick up a sandbox that is already running and start clipboard
    /// monitoring if the user left it on.
    pub async fn startup(&self) {
        self.restore_session().await;

        let wanted = self.settings.clipboard.enabled && self.store.preferences().clipboard_monitoring;
        if wanted {
            if let Err(e) = self.clipboard.set_enabled(true) {
                warn!(error = %e, "clipboard monitoring off");
            }
        }
    }

    /// Seed the session from the sandbox the dojo says is running
    pub async fn restore_session(&self) -> Option<ChallengeRef> {
        match self.lifecycle.restore_current().await {
            Ok(Some(challenge)) => {
                self.on_path_changed(&challenge.workspace_path(), true);
                Some(challenge)
            }
            Ok(None) => {
                debug!("no running challenge");
                None
            }
            Err(e) => {
                warn!(error = %e, "starting without a restored challenge");
                None
            }
        }
    }

    /// Open a challenge's workspace and start its sandbox
    pub async fn open_challenge(
        &self,
        challenge: &ChallengeRef,
        practice: bool,
    ) -> Result<(), WorkspaceError> {
        self.url.replace_path(&challenge.workspace_path());
        self.store.set_active_resource(None);
        self.store.set_minimized(false);
        let started = self.lifecycle.start(challenge, practice).await;
        self.refresh_workspace();
        started
    }

    pub fn open_resource(&self, resource: &str) {
        if let Some(active) = self.store.active_challenge() {
            self.url.replace_path(&format!(
                "{}/workspace/resource/{resource}",
                active.reference().module_path()
            ));
        }
        self.store.set_active_resource(Some(resource.to_string()));
    }

    pub fn select_service(&self, service: Service) {
        if self.store.active_service() == service {
            return;
        }
        info!(%service, "service selected");
        self.store.set_active_service(service);
        self.refresh_workspace();
    }

    pub async fn restart(&self, practice: Option<bool>) -> Result<(), WorkspaceError> {
        self.forget_probe();
        let result = self.lifecycle.restart(practice).await;
        self.refresh_workspace();
        result
    }

    pub async fn set_practice(&self, practice: bool) -> Result<bool, WorkspaceError> {
        let active = self.store.active_challenge().ok_or(WorkspaceError::NoActiveChallenge)?;
        if active.practice == practice {
            return Ok(false);
        }
        self.restart(Some(practice)).await?;
        Ok(true)
    }

    /// Move on to the next challenge. Any open popup closes whatever the
    /// outcome.
    pub async fn next(&self) -> Result<NextOutcome, WorkspaceError> {
        let outcome = self.lifecycle.next().await;
        self.submission.close_popup();

        match &outcome {
            Ok(NextOutcome::InPlace(target)) => {
                self.url.replace_path(&target.workspace_path());
                self.refresh_workspace();
            }
            Ok(NextOutcome::Reloaded(target)) => {
                self.on_path_changed(&target.workspace_path(), true);
                if let Err(e) = self.lifecycle.start(target, false).await {
                    warn!(%target, error = %e, "next challenge failed to start");
                    self.refresh_workspace();
                    return Err(e);
                }
                self.refresh_workspace();
            }
            Ok(NextOutcome::NoNext) => {}
            Err(e) => {
                warn!(error = %e, "next challenge failed");
                self.follow_store();
            }
        }
        outcome
    }

    /// Point the path and the prober at the store's challenge if a failed
    /// call left them behind
    fn follow_store(&self) {
        let Some(active) = self.store.active_challenge() else {
            return;
        };
        let challenge = active.reference();
        if self.url.route().challenge().as_ref() != Some(&challenge) {
            self.url.replace_path(&challenge.workspace_path());
            self.refresh_workspace();
        }
    }

    pub async fn terminate(&self) -> Result<(), WorkspaceError> {
        let result = self.lifecycle.terminate().await;
        if self.store.active_challenge().is_none() {
            self.locator_slot.cancel();
            self.forget_probe();
            self.status.send_replace(WorkspaceStatus::default());
        }
        result
    }

    pub async fn reset_home(&self) -> Result<(), WorkspaceError> {
        self.lifecycle.reset_home().await
    }

    /// A route transition in the app
    pub fn on_path_changed(&self, path: &str, reload: bool) -> Route {
        let before = self.store.active_challenge().map(|c| c.reference());
        let route = self.url.on_path_changed(path, reload);
        if let Some(challenge) = route.challenge() {
            if reload || before.as_ref() != Some(&challenge) {
                self.refresh_workspace();
            }
        }
        route
    }

    pub fn minimize(&self) {
        self.url.minimize();
    }

    pub fn close(&self) -> Option<String> {
        self.url.close()
    }

    pub fn set_input(&self, text: &str) {
        self.submission.set_input(text);
    }

    pub async fn submit_input(&self) -> Result<Option<SubmissionResult>, WorkspaceError> {
        self.submission.submit_input().await
    }

    pub fn clear_input(&self) {
        self.submission.clear_input();
    }

    pub async fn popup_action(&self, action: PopupAction) -> Result<(), WorkspaceError> {
        match action {
            PopupAction::Submit => self.submission.accept_clipboard().await.map(|_| ()),
            PopupAction::Dismiss => {
                self.submission.dismiss();
                Ok(())
            }
            PopupAction::Close => {
                self.submission.close_popup();
                Ok(())
            }
            PopupAction::NextChallenge => self.next().await.map(|_| ()),
            PopupAction::LogIn => {
                self.submission.close_popup();
                let _ = self.events.send(WorkspaceEvent::Navigate {
                    path: "/login".to_string(),
                    reload: true,
                });
                Ok(())
            }
        }
    }

    /// Toggle clipboard monitoring and remember the choice
    pub fn set_clipboard_monitoring(&self, enabled: bool) -> Result<(), WorkspaceError> {
        let mut preferences = self.store.preferences();
        preferences.clipboard_monitoring = enabled;
        if let Err(e) = self.store.save_preferences(&preferences) {
            warn!(error = %e, "could not save clipboard preference");
        }
        self.clipboard.set_enabled(enabled)
    }

    pub fn on_focus_regained(&self) {
        self.clipboard.on_focus_regained();
    }

    pub fn on_copy(&self) {
        self.clipboard.on_copy();
    }

    /// Ask the dojo where the selected service lives and probe it. Runs in
    /// the background; a newer refresh supersedes an older one.
    pub fn refresh_workspace(&self) {
        let Some(active) = self.store.active_challenge() else {
            self.locator_slot.cancel();
            self.forget_probe();
            return;
        };
        let challenge = active.reference();
        {
            let mut probed_for = lock(&self.probed_for);
            if probed_for.as_ref() != Some(&challenge) {
                self.prober.cancel();
                *probed_for = Some(challenge.clone());
            }
        }

        let locator = Locator {
            api: Arc::clone(&self.api),
            prober: Arc::clone(&self.prober),
            lifecycle: Arc::clone(&self.lifecycle),
            status: Arc::clone(&self.status),
            origin: self.settings.server.origin(),
            refetch: self.settings.lifecycle.workspace_refetch(),
        };
        let service = self.store.active_service();
        self.locator_slot
            .schedule(move |generation| locator.run(challenge, service, generation));
    }

    fn forget_probe(&self) {
        self.prober.cancel();
        *lock(&self.probed_for) = None;
    }

    #[cfg(test)]
    pub(crate) fn lifecycle(&self) -> &ContainerLifecycle {
        &self.lifecycle
    }
}

/// Finds the iframe URL for a service, refetching while the dojo reports the
/// workspace active but has not handed one out yet
struct Locator {
    api: Arc<dyn DojoApi>,
    prober: Arc<ReadinessProber>,
    lifecycle: Arc<ContainerLifecycle>,
    status: Arc<watch::Sender<WorkspaceStatus>>,
    origin: String,
    refetch: Duration,
}

impl Locator {
    async fn run(self, challenge: ChallengeRef, service: Service, generation: Generation) {
        loop {
            let response = self.api.workspace(service).await;
            if !generation.is_current() {
                return;
            }

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    let err = WorkspaceError::from(e);
                    warn!(%challenge, %service, error = %err, "workspace lookup failed");
                    self.status.send_replace(WorkspaceStatus {
                        error: Some(err.to_string()),
                        ..WorkspaceStatus::default()
                    });
                    return;
                }
            };

            if !response.active {
                debug!(%challenge, "workspace not active");
                self.prober.cancel();
                self.status.send_replace(WorkspaceStatus {
                    error: response.error,
                    ..WorkspaceStatus::default()
                });
                return;
            }

            let Some(src) = response.iframe_src else {
                debug!(%challenge, %service, refetch = ?self.refetch, "waiting for service url");
                self.status.send_replace(WorkspaceStatus {
                    active: true,
                    locating: true,
                    ..WorkspaceStatus::default()
                });
                tokio::time::sleep(self.refetch).await;
                if !generation.is_current() {
                    return;
                }
                continue;
            };

            self.status.send_replace(WorkspaceStatus {
                active: true,
                iframe_src: Some(src.clone()),
                error: None,
                locating: false,
            });

            let url = if src.starts_with("http://") || src.starts_with("https://") {
                src
            } else {
                format!("{}{}", self.origin, src)
            };
            let lifecycle = Arc::clone(&self.lifecycle);
            let ready_for = challenge.clone();
            if !self
                .prober
                .watch(&url, service, move |ready| {
                    if ready {
                        lifecycle.confirm_ready(&ready_for);
                    } else {
                        lifecycle.readiness_failed(&ready_for);
                    }
                })
            {
                // Same target, already confirmed: nothing new to wait for
                if self.prober.state().ready {
                    self.lifecycle.confirm_ready(&challenge);
                }
            }
            return;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
