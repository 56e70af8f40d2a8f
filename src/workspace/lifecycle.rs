use super::store::SessionStore;
use super::timer::TaskSlot;
use super::{WorkspaceError, WorkspaceEvent};
use crate::client::{ApiError, DojoApi};
use crate::models::{ActiveChallenge, ChallengeRef};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Where `next` took the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextOutcome {
    /// Nothing left to do in this progression
    NoNext,
    /// Different module: full navigation, module data is loaded again
    Reloaded(ChallengeRef),
    /// Same module: store updated and sandbox started in place
    InPlace(ChallengeRef),
}

/// Starts, restarts and stops the sandbox behind the active challenge
pub struct ContainerLifecycle {
    api: Arc<dyn DojoApi>,
    store: SessionStore,
    events: broadcast::Sender<WorkspaceEvent>,
    start_timeout: Duration,
    timeout_slot: TaskSlot,
    /// Bumped by every start; only the latest may settle `is_starting`
    starts: AtomicU64,
}

impl ContainerLifecycle {
    pub fn new(
        api: Arc<dyn DojoApi>,
        store: SessionStore,
        events: broadcast::Sender<WorkspaceEvent>,
        start_timeout: Duration,
    ) -> Self {
        Self {
            api,
            store,
            events,
            start_timeout,
            timeout_slot: TaskSlot::new(),
            starts: AtomicU64::new(0),
        }
    }

    /// Mark the challenge as starting right away, then ask the dojo for a
    /// sandbox. `is_starting` is cleared by [`confirm_ready`], by a failure,
    /// or by the start timeout, whichever comes first.
    ///
    /// [`confirm_ready`]: ContainerLifecycle::confirm_ready
    pub async fn start(&self, challenge: &ChallengeRef, practice: bool) -> Result<(), WorkspaceError> {
        let active = match self.store.active_challenge() {
            Some(existing) if existing.is(challenge) => existing,
            _ => ActiveChallenge::placeholder(challenge),
        };
        let ticket = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
        self.store.set_active_challenge(Some(active.starting(practice)));
        self.arm_timeout(challenge);

        info!(%challenge, practice, "starting challenge");
        let response = self.api.start(challenge, practice).await;

        // A newer start owns the store now, even for the same challenge
        if self.starts.load(Ordering::SeqCst) != ticket
            || !self.store.active_challenge().is_some_and(|c| c.is(challenge))
        {
            info!(%challenge, "start superseded");
            return Ok(());
        }

        let err = match response {
            Ok(response) if response.success => return Ok(()),
            Ok(response) => WorkspaceError::StartFailed(response.error_text()),
            Err(e) => WorkspaceError::from(e),
        };
        warn!(%challenge, error = %err, "challenge start failed");
        self.timeout_slot.cancel();
        self.store.mark_starting(challenge, false);
        Err(err)
    }

    /// Start the active challenge again, optionally switching practice mode
    pub async fn restart(&self, practice: Option<bool>) -> Result<(), WorkspaceError> {
        let active = self
            .store
            .active_challenge()
            .ok_or(WorkspaceError::NoActiveChallenge)?;
        let practice = practice.unwrap_or(active.practice);
        self.start(&active.reference(), practice).await
    }

    /// Switching practice mode always restarts. Returns whether it did.
    pub async fn set_practice(&self, practice: bool) -> Result<bool, WorkspaceError> {
        let active = self
            .store
            .active_challenge()
            .ok_or(WorkspaceError::NoActiveChallenge)?;
        if active.practice == practice {
            return Ok(false);
        }
        self.restart(Some(practice)).await?;
        Ok(true)
    }

    /// The selected service answered for `challenge`
    pub fn confirm_ready(&self, challenge: &ChallengeRef) {
        if self.store.mark_starting(challenge, false) {
            info!(%challenge, "challenge ready");
        }
        if !self.store.snapshot().is_starting() {
            self.timeout_slot.cancel();
        }
    }

    /// Readiness polling gave up on `challenge`; stop waiting for it
    pub fn readiness_failed(&self, challenge: &ChallengeRef) {
        if self.store.mark_starting(challenge, false) {
            warn!(%challenge, "service never came up, no longer starting");
        }
        if !self.store.snapshot().is_starting() {
            self.timeout_slot.cancel();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.timeout_slot.scheduled() > 0
    }

    /// Ask for the next challenge and go there
    pub async fn next(&self) -> Result<NextOutcome, WorkspaceError> {
        let response = self.api.next().await?;
        let Some(target) = response.target() else {
            info!(error = ?response.error, "no next challenge");
            return Ok(NextOutcome::NoNext);
        };
        let path = target.workspace_path();

        let other_module = self.store.active_challenge().is_some_and(|current| {
            current.dojo_id != target.dojo_id || current.module_id != target.module_id
        });
        if other_module {
            info!(%target, "next challenge is in another module");
            let _ = self.events.send(WorkspaceEvent::Navigate { path, reload: true });
            return Ok(NextOutcome::Reloaded(target));
        }

        self.store
            .set_active_challenge(Some(ActiveChallenge::placeholder(&target).starting(false)));
        let _ = self.events.send(WorkspaceEvent::Navigate { path, reload: false });
        self.start(&target, false).await?;
        Ok(NextOutcome::InPlace(target))
    }

    /// Stop the sandbox. The workspace closes unless the dojo refused.
    pub async fn terminate(&self) -> Result<(), WorkspaceError> {
        let result = self.api.terminate().await;
        match result {
            Ok(response) if !response.success => {
                let err = WorkspaceError::Rejected(response.error_text());
                warn!(error = %err, "terminate refused");
                Err(err)
            }
            Ok(_) => {
                info!("sandbox terminated");
                self.close();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "terminate failed, closing workspace anyway");
                self.close();
                Err(e.into())
            }
        }
    }

    /// Seed the store from the sandbox the dojo says is running
    pub async fn restore_current(&self) -> Result<Option<ChallengeRef>, WorkspaceError> {
        let current = match self.api.current_challenge().await {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "could not fetch current challenge");
                return Err(e.into());
            }
        };
        let Some(current) = current else {
            return Ok(None);
        };

        let challenge = current.reference();
        if !self.store.active_challenge().is_some_and(|c| c.is(&challenge)) {
            let mut active = ActiveChallenge::placeholder(&challenge);
            if let Some(name) = current.challenge_name {
                active.challenge_name = name;
            }
            info!(%challenge, "restored running challenge");
            self.store.set_active_challenge(Some(active));
        }
        Ok(Some(challenge))
    }

    pub async fn reset_home(&self) -> Result<(), WorkspaceError> {
        match self.api.reset_home().await {
            Ok(response) if response.success => {
                info!("home directory reset");
                Ok(())
            }
            Ok(response) => Err(WorkspaceError::Rejected(response.error_text())),
            Err(ApiError::Unauthorized) => Err(WorkspaceError::AuthRequired),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&self) {
        self.timeout_slot.cancel();
        self.store.close_workspace();
    }

    fn arm_timeout(&self, challenge: &ChallengeRef) {
        let store = self.store.clone();
        let challenge = challenge.clone();
        let timeout = self.start_timeout;
        self.timeout_slot.schedule_after(timeout, move || {
            if store.mark_starting(&challenge, false) {
                warn!(%challenge, ?timeout, "start never confirmed, clearing pending state");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{Call, FakeDojoApi};
    use crate::client::{ActionResponse, CurrentChallenge, NextResponse};
    use crate::persistence::MemoryPreferenceStore;

    struct Harness {
        api: Arc<FakeDojoApi>,
        store: SessionStore,
        lifecycle: ContainerLifecycle,
        events: broadcast::Receiver<WorkspaceEvent>,
    }

    fn harness_with(api: FakeDojoApi) -> Harness {
        let api = Arc::new(api);
        let store = SessionStore::new(Arc::new(MemoryPreferenceStore::default()));
        let (tx, events) = broadcast::channel(16);
        let lifecycle =
            ContainerLifecycle::new(api.clone(), store.clone(), tx, Duration::from_secs(60));
        Harness {
            api,
            store,
            lifecycle,
            events,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeDojoApi::new())
    }

    fn hello() -> ChallengeRef {
        ChallengeRef::new("intro", "basics", "hello")
    }

    fn next_to(dojo: &str, module: &str, challenge: &str) -> NextResponse {
        NextResponse {
            success: true,
            dojo: Some(dojo.into()),
            module: Some(module.into()),
            challenge: Some(challenge.into()),
            error: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_starting_is_set_before_the_call_resolves() {
        let h = Arc::new(harness_with(FakeDojoApi::with_latency(Duration::from_secs(2))));
        let task = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.lifecycle.start(&hello(), false).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = h.store.snapshot();
        assert!(state.is_starting());
        assert!(h.api.count(|c| matches!(c, Call::Start(..))) == 1);

        task.await.unwrap().unwrap();
        assert!(h.store.snapshot().is_starting(), "cleared only by readiness");

        h.lifecycle.confirm_ready(&hello());
        assert!(!h.store.snapshot().is_starting());
        assert!(!h.lifecycle.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_clears_starting() {
        let h = harness();
        h.api.push_start(Ok(ActionResponse::failed("practice mode not allowed")));

        let err = h.lifecycle.start(&hello(), true).await.unwrap_err();
        assert_eq!(err, WorkspaceError::StartFailed("practice mode not allowed".into()));
        assert!(!h.store.snapshot().is_starting());
        assert!(!h.lifecycle.is_pending());

        h.api.push_start(Err(ApiError::Timeout));
        let err = h.lifecycle.start(&hello(), false).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::NetworkError(_)));
        assert!(!h.store.snapshot().is_starting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_failure_leaves_newer_start_pending() {
        let h = Arc::new(harness_with(FakeDojoApi::with_latency(Duration::from_secs(2))));
        h.api.push_start(Err(ApiError::Timeout));
        h.api.push_start(Ok(ActionResponse::ok()));

        let first = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.lifecycle.start(&hello(), false).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.lifecycle.restart(Some(true)).await })
        };

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(first.await.unwrap(), Ok(()));
        let active = h.store.active_challenge().unwrap();
        assert!(active.is_starting);
        assert!(active.practice);
        assert!(h.lifecycle.is_pending());

        second.await.unwrap().unwrap();
        assert!(h.store.snapshot().is_starting());
        h.lifecycle.confirm_ready(&hello());
        assert!(!h.store.snapshot().is_starting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_start_times_out() {
        let h = harness();
        h.lifecycle.start(&hello(), false).await.unwrap();
        assert!(h.store.snapshot().is_starting());

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(h.store.snapshot().is_starting());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!h.store.snapshot().is_starting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_practice_round_trip() {
        let h = harness();
        h.lifecycle.start(&hello(), false).await.unwrap();
        h.lifecycle.confirm_ready(&hello());

        h.lifecycle.restart(Some(true)).await.unwrap();
        assert!(h.store.active_challenge().unwrap().practice);
        h.lifecycle.confirm_ready(&hello());

        assert!(h.lifecycle.set_practice(false).await.unwrap());
        h.lifecycle.confirm_ready(&hello());

        let active = h.store.active_challenge().unwrap();
        assert!(!active.is_starting);
        assert!(!active.practice);
        assert_eq!(
            h.api.calls(),
            vec![
                Call::Start(hello(), false),
                Call::Start(hello(), true),
                Call::Start(hello(), false),
            ]
        );
        assert!(!h.lifecycle.set_practice(false).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_without_challenge() {
        let h = harness();
        assert_eq!(
            h.lifecycle.restart(None).await,
            Err(WorkspaceError::NoActiveChallenge)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_in_other_module_takes_reload_path() {
        let mut h = harness();
        h.store
            .set_active_challenge(Some(ActiveChallenge::placeholder(&hello())));
        h.api.set_next(Ok(next_to("intro", "shell", "pipes")));

        let outcome = h.lifecycle.next().await.unwrap();
        let target = ChallengeRef::new("intro", "shell", "pipes");
        assert_eq!(outcome, NextOutcome::Reloaded(target.clone()));

        assert!(h.store.active_challenge().unwrap().is(&hello()));
        assert_eq!(h.api.count(|c| matches!(c, Call::Start(..))), 0);
        assert_eq!(
            h.events.try_recv().unwrap(),
            WorkspaceEvent::Navigate {
                path: target.workspace_path(),
                reload: true
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_in_same_module_updates_in_place() {
        let mut h = harness();
        h.store
            .set_active_challenge(Some(ActiveChallenge::placeholder(&hello())));
        h.api.set_next(Ok(next_to("intro", "basics", "world")));

        let outcome = h.lifecycle.next().await.unwrap();
        let target = ChallengeRef::new("intro", "basics", "world");
        assert_eq!(outcome, NextOutcome::InPlace(target.clone()));

        let active = h.store.active_challenge().unwrap();
        assert!(active.is(&target));
        assert!(active.is_starting);
        assert_eq!(
            h.events.try_recv().unwrap(),
            WorkspaceEvent::Navigate {
                path: target.workspace_path(),
                reload: false
            }
        );
        assert_eq!(h.api.calls(), vec![Call::Next, Call::Start(target, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_next_is_a_no_op() {
        let mut h = harness();
        h.store
            .set_active_challenge(Some(ActiveChallenge::placeholder(&hello())));

        assert_eq!(h.lifecycle.next().await.unwrap(), NextOutcome::NoNext);
        assert!(h.store.active_challenge().unwrap().is(&hello()));
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminate_closes_unless_refused() {
        let h = harness();
        h.lifecycle.start(&hello(), false).await.unwrap();

        *h.api.terminate_result.lock().unwrap() =
            Some(Ok(ActionResponse::failed("no running container")));
        assert!(matches!(
            h.lifecycle.terminate().await,
            Err(WorkspaceError::Rejected(_))
        ));
        assert!(h.store.active_challenge().is_some());

        *h.api.terminate_result.lock().unwrap() = Some(Err(ApiError::Timeout));
        assert!(h.lifecycle.terminate().await.is_err());
        assert!(h.store.active_challenge().is_none());
        assert!(!h.lifecycle.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_current_seeds_store() {
        let h = harness();
        *h.api.current.lock().unwrap() = Some(CurrentChallenge {
            dojo_id: "intro".into(),
            module_id: "basics".into(),
            challenge_id: "hello".into(),
            challenge_name: Some("Hello World".into()),
        });

        assert_eq!(h.lifecycle.restore_current().await.unwrap(), Some(hello()));
        let active = h.store.active_challenge().unwrap();
        assert_eq!(active.challenge_name, "Hello World");
        assert_eq!(active.module_name, "basics");
        assert!(!active.is_starting);
    }
}
