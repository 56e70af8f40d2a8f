use crate::models::{ActiveChallenge, ChallengeMetadata, ChallengeRef, Service};
use crate::persistence::{PreferenceStore, Preferences};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

pub const DEFAULT_SIDEBAR_WIDTH: u16 = 38;

/// Everything the workspace view renders from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub active_challenge: Option<ActiveChallenge>,
    pub active_resource: Option<String>,
    /// Service shown for the current open
    pub active_service: Service,
    /// Service remembered across sessions
    pub preferred_service: Service,
    pub full_screen: bool,
    pub sidebar_collapsed: bool,
    pub sidebar_width: u16,
    /// Overlay hidden without terminating the sandbox
    pub minimized: bool,
}

impl SessionState {
    fn with_service(service: Service) -> Self {
        Self {
            active_challenge: None,
            active_resource: None,
            active_service: service,
            preferred_service: service,
            full_screen: false,
            sidebar_collapsed: false,
            sidebar_width: DEFAULT_SIDEBAR_WIDTH,
            minimized: false,
        }
    }

    pub fn is_starting(&self) -> bool {
        self.active_challenge.as_ref().is_some_and(|c| c.is_starting)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::with_service(Service::default())
    }
}

/// Single source of truth for the open challenge/resource and view flags.
///
/// Every setter is synchronous, never fails, and has notified all
/// subscribers by the time it returns.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionState>>,
    preferences: Arc<dyn PreferenceStore>,
}

impl SessionStore {
    pub fn new(preferences: Arc<dyn PreferenceStore>) -> Self {
        let preferred = match preferences.load() {
            Ok(saved) => saved.preferred_service,
            Err(e) => {
                warn!(error = %e, "could not load service preference");
                Service::default()
            }
        };
        let (tx, _) = watch::channel(SessionState::with_service(preferred));
        Self {
            tx: Arc::new(tx),
            preferences,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn active_challenge(&self) -> Option<ActiveChallenge> {
        self.tx.borrow().active_challenge.clone()
    }

    pub fn active_service(&self) -> Service {
        self.tx.borrow().active_service
    }

    pub fn set_active_challenge(&self, challenge: Option<ActiveChallenge>) {
        debug!(challenge = ?challenge.as_ref().map(|c| c.reference().to_string()), "active challenge");
        self.tx.send_modify(|state| state.active_challenge = challenge);
    }

    /// Switch the displayed service and remember it as the preference.
    /// Persisting is best-effort.
    pub fn set_active_service(&self, service: Service) {
        self.tx.send_modify(|state| {
            state.active_service = service;
            state.preferred_service = service;
        });

        let mut preferences = self.preferences.load().unwrap_or_default();
        preferences.preferred_service = service;
        if let Err(e) = self.preferences.save(&preferences) {
            warn!(error = %e, %service, "could not save service preference");
        }
    }

    pub fn set_active_resource(&self, resource: Option<String>) {
        self.tx.send_modify(|state| state.active_resource = resource);
    }

    pub fn set_full_screen(&self, full_screen: bool) {
        self.tx.send_modify(|state| state.full_screen = full_screen);
    }

    pub fn set_sidebar_collapsed(&self, collapsed: bool) {
        self.tx.send_modify(|state| state.sidebar_collapsed = collapsed);
    }

    pub fn set_sidebar_width(&self, width: u16) {
        self.tx.send_modify(|state| state.sidebar_width = width);
    }

    pub fn set_minimized(&self, minimized: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.minimized != minimized;
            state.minimized = minimized;
            changed
        });
    }

    /// Set `is_starting` on the active challenge, only if it is still `challenge`.
    /// Returns whether anything changed.
    pub fn mark_starting(&self, challenge: &ChallengeRef, starting: bool) -> bool {
        self.tx.send_if_modified(|state| match state.active_challenge.as_mut() {
            Some(active) if active.is(challenge) && active.is_starting != starting => {
                active.is_starting = starting;
                true
            }
            _ => false,
        })
    }

    /// Patch names into the active challenge if it is still `challenge`
    pub fn apply_metadata(&self, challenge: &ChallengeRef, metadata: ChallengeMetadata) -> bool {
        self.tx.send_if_modified(|state| match state.active_challenge.as_mut() {
            Some(active) if active.is(challenge) => {
                active.apply_metadata(metadata);
                true
            }
            _ => false,
        })
    }

    /// Clear the challenge and resource but keep view preferences
    pub fn close_workspace(&self) {
        self.tx.send_modify(|state| {
            state.active_challenge = None;
            state.active_resource = None;
            state.minimized = false;
        });
    }

    /// Back to a fresh session, keeping only the persisted service preference
    pub fn reset(&self) {
        let preferred = self.tx.borrow().preferred_service;
        self.tx.send_replace(SessionState::with_service(preferred));
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences.load().unwrap_or_default()
    }

    pub fn save_preferences(&self, preferences: &Preferences) -> anyhow::Result<()> {
        self.preferences.save(preferences)
    }
}
