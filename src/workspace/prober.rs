use super::timer::{Generation, TaskSlot};
use super::WorkspaceError;
use crate::client::{ProbeOutcome, ServiceProbe};
use crate::config::ReadinessSettings;
use crate::models::Service;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Progress of the readiness check for one iframe target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessState {
    pub loading: bool,
    pub ready: bool,
    pub error: Option<String>,
    pub attempt: u32,
    pub url: Option<String>,
    /// Ready was assumed after repeated unreachable probes, not confirmed
    pub fallback: bool,
}

impl ReadinessState {
    fn probing(url: &str) -> Self {
        Self {
            loading: true,
            url: Some(url.to_string()),
            ..Self::default()
        }
    }
}

/// Polls the selected service until it answers, gives up, or is superseded
pub struct ReadinessProber {
    probe: Arc<dyn ServiceProbe>,
    settings: ReadinessSettings,
    state: Arc<watch::Sender<ReadinessState>>,
    slot: TaskSlot,
}

impl ReadinessProber {
    pub fn new(probe: Arc<dyn ServiceProbe>, settings: ReadinessSettings) -> Self {
        let (state, _) = watch::channel(ReadinessState::default());
        Self {
            probe,
            settings,
            state: Arc::new(state),
            slot: TaskSlot::new(),
        }
    }

    pub fn state(&self) -> ReadinessState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.state.subscribe()
    }

    /// Start probing `url`. `on_settled` runs once with `true` when the
    /// service answers and `false` when polling gives up; a superseded loop
    /// never calls it. Returns false when the target is unchanged and either
    /// already confirmed or still being probed.
    pub fn watch<F>(&self, url: &str, service: Service, on_settled: F) -> bool
    where
        F: FnOnce(bool) + Send + 'static,
    {
        {
            let current = self.state.borrow();
            if current.url.as_deref() == Some(url)
                && (current.ready || (current.loading && self.slot.scheduled() > 0))
            {
                debug!(url, "readiness target unchanged");
                return false;
            }
        }

        self.slot.cancel();
        self.state.send_replace(ReadinessState::probing(url));

        let probe = Arc::clone(&self.probe);
        let state = Arc::clone(&self.state);
        let settings = self.settings.clone();
        let url = url.to_string();
        self.slot.schedule(move |generation| {
            poll(probe, state, settings, url, service, generation, on_settled)
        });
        true
    }

    /// Stop probing and forget the target
    pub fn cancel(&self) {
        self.slot.cancel();
        self.state.send_replace(ReadinessState::default());
    }

    #[cfg(test)]
    pub(crate) fn scheduled(&self) -> usize {
        self.slot.scheduled()
    }
}

async fn poll<F>(
    probe: Arc<dyn ServiceProbe>,
    state: Arc<watch::Sender<ReadinessState>>,
    settings: ReadinessSettings,
    url: String,
    service: Service,
    generation: Generation,
    on_settled: F,
) where
    F: FnOnce(bool) + Send + 'static,
{
    let mut ticker = tokio::time::interval(settings.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempt = 0u32;

    loop {
        ticker.tick().await;
        if !generation.is_current() {
            return;
        }

        attempt += 1;
        if attempt > settings.max_retries {
            let waited = settings.interval().as_secs_f64() * f64::from(settings.max_retries);
            let error = WorkspaceError::Timeout(format!(
                "{} service timed out after {} seconds",
                service.display_name(),
                waited.round()
            ));
            warn!(%url, attempts = settings.max_retries, "readiness polling exhausted");
            state.send_modify(|s| {
                s.loading = false;
                s.error = Some(error.to_string());
            });
            on_settled(false);
            return;
        }
        state.send_modify(|s| s.attempt = attempt);

        let outcome = probe.probe(&url).await;
        if !generation.is_current() {
            return;
        }

        let fallback = match outcome {
            ProbeOutcome::Ready => false,
            ProbeOutcome::NotReady(status) => {
                debug!(%url, status, attempt, "service still booting");
                continue;
            }
            ProbeOutcome::Unexpected(status) => {
                warn!(%url, status, attempt, "{service} service returned unexpected status");
                continue;
            }
            ProbeOutcome::Unreachable(reason) => {
                if attempt <= settings.fallback_after {
                    debug!(%url, attempt, %reason, "readiness probe inconclusive");
                    continue;
                }
                warn!(%url, attempt, %reason, "loading service without confirmation");
                true
            }
        };

        info!(%url, attempt, fallback, "{service} service ready");
        state.send_modify(|s| {
            s.loading = false;
            s.ready = true;
            s.error = None;
            s.fallback = fallback;
        });
        on_settled(true);
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::ScriptedProbe;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn settings() -> ReadinessSettings {
        ReadinessSettings {
            interval_ms: 1000,
            max_retries: 30,
            fallback_after: 3,
        }
    }

    /// Counts ready confirmations; a give-up is recorded as `usize::MAX`
    fn counter() -> (Arc<AtomicUsize>, impl FnOnce(bool) + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let hook = Arc::clone(&count);
        (count, move |ready: bool| {
            if ready {
                hook.fetch_add(1, Ordering::SeqCst);
            } else {
                hook.store(usize::MAX, Ordering::SeqCst);
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_target_stops_polling() {
        let probe = Arc::new(ScriptedProbe::new(vec![
            ProbeOutcome::NotReady(502),
            ProbeOutcome::NotReady(503),
            ProbeOutcome::Ready,
        ]));
        let prober = ReadinessProber::new(probe.clone(), settings());
        let (ready_calls, on_ready) = counter();

        assert!(prober.watch("/workspace/terminal/", Service::Terminal, on_ready));
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let state = prober.state();
        assert!(state.ready);
        assert!(!state.loading);
        assert!(!state.fallback);
        assert_eq!(state.attempt, 3);
        assert_eq!(ready_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(probe.count(), 3);
        assert_eq!(ready_calls.load(Ordering::SeqCst), 1);
        assert_eq!(prober.scheduled(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_ready_target_is_not_reprobed() {
        let probe = Arc::new(ScriptedProbe::always(ProbeOutcome::Ready));
        let prober = ReadinessProber::new(probe.clone(), settings());

        prober.watch("/workspace/code/", Service::Code, |_| {});
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(prober.state().ready);

        let (ready_calls, on_ready) = counter();
        assert!(!prober.watch("/workspace/code/", Service::Code, on_ready));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(probe.count(), 1);
        assert_eq!(ready_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_target_cancels_previous_loop() {
        let probe = Arc::new(ScriptedProbe::always(ProbeOutcome::NotReady(502)));
        let prober = ReadinessProber::new(probe.clone(), settings());
        let (stale_ready, on_stale) = counter();

        prober.watch("/workspace/terminal/", Service::Terminal, on_stale);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(probe.count_for("/workspace/terminal/"), 2);

        prober.watch("/workspace/desktop/", Service::Desktop, |_| {});
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(probe.count_for("/workspace/terminal/"), 2);
        assert!(probe.count_for("/workspace/desktop/") >= 10);
        let state = prober.state();
        assert_eq!(state.url.as_deref(), Some("/workspace/desktop/"));
        assert_eq!(stale_ready.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_is_terminal() {
        let probe = Arc::new(ScriptedProbe::always(ProbeOutcome::Unexpected(500)));
        let prober = ReadinessProber::new(probe.clone(), settings());
        let (ready_calls, on_ready) = counter();

        prober.watch("/workspace/terminal/", Service::Terminal, on_ready);
        tokio::time::sleep(Duration::from_secs(40)).await;

        let state = prober.state();
        assert!(!state.loading);
        assert!(!state.ready);
        assert_eq!(
            state.error.as_deref(),
            Some("Terminal service timed out after 30 seconds. Try refreshing the workspace.")
        );
        assert_eq!(probe.count(), 30);
        assert_eq!(ready_calls.load(Ordering::SeqCst), usize::MAX, "reported the give-up");
        assert_eq!(prober.scheduled(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_falls_back_after_three_attempts() {
        let probe = Arc::new(ScriptedProbe::always(ProbeOutcome::Unreachable(
            "connection reset".to_string(),
        )));
        let prober = ReadinessProber::new(probe.clone(), settings());
        let (ready_calls, on_ready) = counter();

        prober.watch("/workspace/desktop/", Service::Desktop, on_ready);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(prober.state().loading);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let state = prober.state();
        assert!(state.ready);
        assert!(state.fallback);
        assert_eq!(state.attempt, 4);
        assert_eq!(ready_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_resets_state() {
        let probe = Arc::new(ScriptedProbe::always(ProbeOutcome::NotReady(502)));
        let prober = ReadinessProber::new(probe.clone(), settings());

        prober.watch("/workspace/terminal/", Service::Terminal, |_| {});
        tokio::time::sleep(Duration::from_millis(500)).await;
        prober.cancel();
        let probes = probe.count();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(probe.count(), probes);
        assert_eq!(prober.state(), ReadinessState::default());
    }
}
