use super::store::SessionStore;
use super::timer::TaskSlot;
use super::WorkspaceEvent;
use crate::client::DojoApi;
use crate::models::{ActiveChallenge, ChallengeRef};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceTarget {
    Challenge(String),
    Resource(String),
}

/// The parts of an app path the workspace cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Dojo {
        dojo: String,
    },
    Module {
        dojo: String,
        module: String,
    },
    Workspace {
        dojo: String,
        module: String,
        target: Option<WorkspaceTarget>,
    },
    Other(String),
}

impl Route {
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();

        match parts.as_slice() {
            [] => Route::Home,
            ["dojo", dojo] => Route::Dojo {
                dojo: dojo.to_string(),
            },
            ["dojo", dojo, "module", module] => Route::Module {
                dojo: dojo.to_string(),
                module: module.to_string(),
            },
            ["dojo", dojo, "module", module, "workspace", rest @ ..] => {
                let target = match rest {
                    ["challenge", id, ..] => Some(WorkspaceTarget::Challenge(id.to_string())),
                    ["resource", id, ..] => Some(WorkspaceTarget::Resource(id.to_string())),
                    _ => None,
                };
                Route::Workspace {
                    dojo: dojo.to_string(),
                    module: module.to_string(),
                    target,
                }
            }
            _ => Route::Other(path.to_string()),
        }
    }

    pub fn is_workspace(&self) -> bool {
        matches!(self, Route::Workspace { .. })
    }

    /// The challenge a workspace path names, if any
    pub fn challenge(&self) -> Option<ChallengeRef> {
        match self {
            Route::Workspace {
                dojo,
                module,
                target: Some(WorkspaceTarget::Challenge(id)),
            } => Some(ChallengeRef::new(dojo, module, id)),
            _ => None,
        }
    }
}

/// Keeps the session store consistent with the current path. The path wins
/// whenever the two disagree about which challenge is open.
pub struct UrlSynchronizer {
    store: SessionStore,
    api: Arc<dyn DojoApi>,
    events: broadcast::Sender<WorkspaceEvent>,
    location: Mutex<String>,
    metadata_slot: TaskSlot,
}

impl UrlSynchronizer {
    pub fn new(
        store: SessionStore,
        api: Arc<dyn DojoApi>,
        events: broadcast::Sender<WorkspaceEvent>,
    ) -> Self {
        Self {
            store,
            api,
            events,
            location: Mutex::new("/".to_string()),
            metadata_slot: TaskSlot::new(),
        }
    }

    pub fn location(&self) -> String {
        self.lock().clone()
    }

    pub fn route(&self) -> Route {
        Route::parse(&self.location())
    }

    /// Update the path without a route transition (history replace)
    pub fn replace_path(&self, path: &str) {
        *self.lock() = path.to_string();
    }

    /// A route transition. `reload` forces names to be fetched again even
    /// when the store already agrees with the path.
    pub fn on_path_changed(&self, path: &str, reload: bool) -> Route {
        *self.lock() = path.to_string();
        let route = Route::parse(path);
        debug!(path, ?route, "path changed");

        let Route::Workspace { target, .. } = &route else {
            return route;
        };

        match target {
            Some(WorkspaceTarget::Challenge(_)) => {
                if let Some(challenge) = route.challenge() {
                    let stale = !self
                        .store
                        .active_challenge()
                        .is_some_and(|c| c.challenge_id == challenge.challenge_id);
                    if stale {
                        self.store
                            .set_active_challenge(Some(ActiveChallenge::placeholder(&challenge)));
                        self.store.set_active_resource(None);
                    }
                    if stale || reload {
                        self.fetch_metadata(challenge);
                    }
                }
            }
            Some(WorkspaceTarget::Resource(resource)) => {
                self.store.set_active_resource(Some(resource.clone()));
            }
            None => {}
        }
        self.store.set_minimized(false);
        route
    }

    /// Hide the overlay; the sandbox keeps running
    pub fn minimize(&self) {
        self.store.set_minimized(true);
    }

    /// Leave the workspace for the module page. Returns the new path.
    pub fn close(&self) -> Option<String> {
        let active = self.store.active_challenge()?;
        let path = active.reference().module_path();
        self.store.set_minimized(true);
        self.on_path_changed(&path, false);
        let _ = self.events.send(WorkspaceEvent::Navigate {
            path: path.clone(),
            reload: false,
        });
        Some(path)
    }

    fn fetch_metadata(&self, challenge: ChallengeRef) {
        let api = Arc::clone(&self.api);
        let store = self.store.clone();
        self.metadata_slot.schedule(move |generation| async move {
            match api.metadata(&challenge).await {
                Ok(Some(metadata)) if generation.is_current() => {
                    store.apply_metadata(&challenge, metadata);
                }
                Ok(Some(_)) => {}
                Ok(None) => debug!(%challenge, "no metadata for challenge"),
                Err(e) => warn!(%challenge, error = %e, "could not load challenge names"),
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, String> {
        self.location.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{Call, FakeDojoApi};
    use crate::models::ChallengeMetadata;
    use crate::persistence::MemoryPreferenceStore;
    use std::time::Duration;

    fn sync_with(api: Arc<FakeDojoApi>) -> (UrlSynchronizer, SessionStore) {
        let store = SessionStore::new(Arc::new(MemoryPreferenceStore::default()));
        let (tx, _) = broadcast::channel(8);
        (UrlSynchronizer::new(store.clone(), api, tx), store)
    }

    fn names() -> ChallengeMetadata {
        ChallengeMetadata {
            dojo_name: "Intro to Cybersecurity".into(),
            module_name: "Basics".into(),
            challenge_name: "Hello World".into(),
        }
    }

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(
            Route::parse("/dojo/intro/module/basics"),
            Route::Module {
                dojo: "intro".into(),
                module: "basics".into()
            }
        );
        assert_eq!(
            Route::parse("/dojo/intro/module/basics/workspace/challenge/hello?service=code")
                .challenge(),
            Some(ChallengeRef::new("intro", "basics", "hello"))
        );
        assert_eq!(
            Route::parse("/dojo/intro/module/basics/workspace/resource/slides-1"),
            Route::Workspace {
                dojo: "intro".into(),
                module: "basics".into(),
                target: Some(WorkspaceTarget::Resource("slides-1".into())),
            }
        );
        assert!(matches!(Route::parse("/settings"), Route::Other(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_path_overrides_stale_store_and_patches_names() {
        let api = Arc::new(FakeDojoApi::with_latency(Duration::from_millis(300)));
        let hello = ChallengeRef::new("intro", "basics", "hello");
        api.set_metadata(&hello, names());
        let (sync, store) = sync_with(api.clone());

        store.set_active_challenge(Some(
            ActiveChallenge::placeholder(&ChallengeRef::new("intro", "basics", "old")),
        ));
        store.set_minimized(true);

        sync.on_path_changed(&hello.workspace_path(), false);
        let active = store.active_challenge().unwrap();
        assert!(active.is(&hello));
        assert_eq!(active.challenge_name, "hello");
        assert!(!store.snapshot().minimized);

        // Flags set meanwhile survive the name patch
        store.mark_starting(&hello, true);
        tokio::time::sleep(Duration::from_millis(400)).await;
        let active = store.active_challenge().unwrap();
        assert_eq!(active.challenge_name, "Hello World");
        assert!(active.is_starting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_store_is_left_alone() {
        let api = Arc::new(FakeDojoApi::new());
        let hello = ChallengeRef::new("intro", "basics", "hello");
        let (sync, store) = sync_with(api.clone());
        let mut active = ActiveChallenge::placeholder(&hello).starting(true);
        active.apply_metadata(names());
        store.set_active_challenge(Some(active.clone()));

        sync.on_path_changed(&hello.workspace_path(), false);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.active_challenge(), Some(active));
        assert_eq!(api.count(|c| matches!(c, Call::Metadata(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_names_for_superseded_challenge_are_dropped() {
        let api = Arc::new(FakeDojoApi::with_latency(Duration::from_millis(300)));
        let first = ChallengeRef::new("intro", "basics", "first");
        let second = ChallengeRef::new("intro", "basics", "second");
        api.set_metadata(&first, names());
        let (sync, store) = sync_with(api);

        sync.on_path_changed(&first.workspace_path(), false);
        tokio::time::sleep(Duration::from_millis(100)).await;
        sync.on_path_changed(&second.workspace_path(), false);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let active = store.active_challenge().unwrap();
        assert!(active.is(&second));
        assert_eq!(active.challenge_name, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_minimize_and_close() {
        let api = Arc::new(FakeDojoApi::new());
        let hello = ChallengeRef::new("intro", "basics", "hello");
        let (sync, store) = sync_with(api);
        sync.on_path_changed(&hello.workspace_path(), false);

        sync.minimize();
        assert!(store.snapshot().minimized);
        assert_eq!(sync.location(), hello.workspace_path());

        assert_eq!(sync.close(), Some("/dojo/intro/module/basics".to_string()));
        assert_eq!(sync.route(), Route::parse("/dojo/intro/module/basics"));
        assert!(store.active_challenge().is_some(), "sandbox keeps running");
    }
}
