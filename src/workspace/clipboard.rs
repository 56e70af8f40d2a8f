use super::timer::TaskSlot;
use super::WorkspaceError;
use crate::models::FlagGrammar;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    /// No clipboard could be opened at all (no display, sandboxed, denied)
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard read failed: {0}")]
    Read(String),
}

/// Where clipboard text comes from
pub trait ClipboardSource: Send + Sync {
    fn read_text(&self) -> Result<String, ClipboardError>;
}

/// The OS clipboard. A fresh handle per read, since holding one open keeps
/// the clipboard owner alive on some platforms.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardSource for SystemClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        match clipboard.get_text() {
            Ok(text) => Ok(text),
            // Empty or non-text clipboard
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(ClipboardError::Read(e.to_string())),
        }
    }
}

/// Flags the user has already seen this session. Shared between the monitor
/// (which reads it) and the submission flow (which records dismissals).
#[derive(Debug, Default)]
pub struct DetectionMemory {
    dismissed: HashSet<String>,
    last_processed: Option<String>,
}

impl DetectionMemory {
    pub fn dismiss(&mut self, flag: &str) {
        self.dismissed.insert(flag.to_string());
        self.last_processed = Some(flag.to_string());
    }

    pub fn is_dismissed(&self, flag: &str) -> bool {
        self.dismissed.contains(flag)
    }

    pub fn mark_processed(&mut self, flag: &str) {
        self.last_processed = Some(flag.to_string());
    }

    pub fn last_processed(&self) -> Option<&str> {
        self.last_processed.as_deref()
    }

    fn already_seen(&self, flag: &str) -> bool {
        self.is_dismissed(flag) || self.last_processed() == Some(flag)
    }
}

pub type SharedMemory = Arc<Mutex<DetectionMemory>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorPhase {
    #[default]
    Disabled,
    RequestingPermission,
    Monitoring,
}

impl MonitorPhase {
    pub fn label(&self) -> &'static str {
        match self {
            MonitorPhase::Disabled => "off",
            MonitorPhase::RequestingPermission => "requesting access",
            MonitorPhase::Monitoring => "watching",
        }
    }
}

pub type DetectHook = Arc<dyn Fn(String) + Send + Sync>;
/// Returns false to keep a candidate from being surfaced
pub type SurfaceFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Debug, Default)]
struct Tracking {
    phase: MonitorPhase,
    enabled: bool,
    baseline: String,
    last_seen: String,
}

struct Detector {
    source: Arc<dyn ClipboardSource>,
    grammar: FlagGrammar,
    memory: SharedMemory,
    tracking: Mutex<Tracking>,
    on_detect: DetectHook,
    filter: Mutex<Option<SurfaceFilter>>,
}

impl Detector {
    /// One clipboard check. Returns the flag if it was surfaced.
    fn check(&self) -> Option<String> {
        if self.tracking().phase != MonitorPhase::Monitoring {
            return None;
        }

        let text = match self.source.read_text() {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "clipboard read failed, will retry");
                return None;
            }
        };
        if text.is_empty() {
            return None;
        }

        {
            let mut tracking = self.tracking();
            if tracking.last_seen == text {
                return None;
            }
            tracking.last_seen = text.clone();
            if tracking.baseline == text {
                return None;
            }
        }

        if !self.grammar.matches(&text) {
            debug!(len = text.len(), "clipboard changed, not a flag");
            return None;
        }

        if lock(&self.memory).already_seen(&text) {
            debug!("flag already seen this session");
            return None;
        }

        let filter = lock(&self.filter).clone();
        if let Some(filter) = filter {
            if !filter(&text) {
                debug!("flag held back by caller");
                return None;
            }
        }

        lock(&self.memory).mark_processed(&text);
        info!("flag detected on clipboard");
        (self.on_detect)(text.clone());
        Some(text)
    }

    /// [`check`](Detector::check) on the blocking pool; an OS clipboard
    /// read can stall on the display server
    async fn check_blocking(self: Arc<Self>) -> Option<String> {
        match tokio::task::spawn_blocking(move || self.check()).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "clipboard check did not finish");
                None
            }
        }
    }

    fn tracking(&self) -> MutexGuard<'_, Tracking> {
        lock(&self.tracking)
    }
}

/// Watches the clipboard for newly copied flags.
///
/// `Disabled -> RequestingPermission -> Monitoring -> Disabled`. Text that
/// was already on the clipboard at start is never surfaced, and neither is
/// anything in the shared [`DetectionMemory`].
pub struct ClipboardMonitor {
    detector: Arc<Detector>,
    poll_interval: Duration,
    copy_check_delay: Duration,
    poll_slot: TaskSlot,
    copy_slot: TaskSlot,
}

impl ClipboardMonitor {
    pub fn new(
        source: Arc<dyn ClipboardSource>,
        grammar: FlagGrammar,
        memory: SharedMemory,
        poll_interval: Duration,
        copy_check_delay: Duration,
        on_detect: DetectHook,
    ) -> Self {
        Self {
            detector: Arc::new(Detector {
                source,
                grammar,
                memory,
                tracking: Mutex::new(Tracking::default()),
                on_detect,
                filter: Mutex::new(None),
            }),
            poll_interval,
            copy_check_delay,
            poll_slot: TaskSlot::new(),
            copy_slot: TaskSlot::new(),
        }
    }

    pub fn set_filter(&self, filter: SurfaceFilter) {
        *lock(&self.detector.filter) = Some(filter);
    }

    pub fn phase(&self) -> MonitorPhase {
        self.detector.tracking().phase
    }

    pub fn is_enabled(&self) -> bool {
        self.detector.tracking().enabled
    }

    /// Turn monitoring on or off. Turning it on can fail with
    /// `PermissionDenied`; manual entry keeps working either way.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), WorkspaceError> {
        self.detector.tracking().enabled = enabled;
        if enabled {
            self.start()
        } else {
            self.stop();
            Ok(())
        }
    }

    pub fn start(&self) -> Result<(), WorkspaceError> {
        {
            let mut tracking = self.detector.tracking();
            if tracking.phase == MonitorPhase::Monitoring {
                return Ok(());
            }
            tracking.enabled = true;
            tracking.phase = MonitorPhase::RequestingPermission;
        }

        let baseline = match self.detector.source.read_text() {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "clipboard monitoring unavailable");
                self.detector.tracking().phase = MonitorPhase::Disabled;
                return Err(WorkspaceError::PermissionDenied);
            }
        };

        {
            let mut tracking = self.detector.tracking();
            tracking.last_seen = baseline.clone();
            tracking.baseline = baseline;
            tracking.phase = MonitorPhase::Monitoring;
        }

        let detector = Arc::clone(&self.detector);
        let period = self.poll_interval;
        self.poll_slot.schedule(move |generation| async move {
            // The baseline read stands in for the first tick
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !generation.is_current() {
                    return;
                }
                Arc::clone(&detector).check_blocking().await;
            }
        });
        info!(interval_ms = period.as_millis() as u64, "clipboard monitoring started");
        Ok(())
    }

    pub fn stop(&self) {
        self.poll_slot.cancel();
        self.copy_slot.cancel();
        let mut tracking = self.detector.tracking();
        if tracking.phase != MonitorPhase::Disabled {
            info!("clipboard monitoring stopped");
        }
        tracking.phase = MonitorPhase::Disabled;
    }

    /// A copy happened in the app; check shortly after, once the clipboard
    /// write has landed.
    pub fn on_copy(&self) {
        if self.phase() != MonitorPhase::Monitoring {
            return;
        }
        let detector = Arc::clone(&self.detector);
        let delay = self.copy_check_delay;
        self.copy_slot.schedule(move |generation| async move {
            tokio::time::sleep(delay).await;
            if generation.is_current() {
                detector.check_blocking().await;
            }
        });
    }

    /// Resume monitoring if it is enabled but not running
    pub fn on_focus_regained(&self) {
        let resume = {
            let tracking = self.detector.tracking();
            tracking.enabled && tracking.phase == MonitorPhase::Disabled
        };
        if resume {
            if let Err(e) = self.start() {
                debug!(error = %e, "clipboard still unavailable on focus");
            }
        }
    }

    /// Run one check now
    pub fn check_now(&self) -> Option<String> {
        self.detector.check()
    }

    #[cfg(test)]
    pub(crate) fn scheduled(&self) -> usize {
        self.poll_slot.scheduled() + self.copy_slot.scheduled()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
pub(crate) use fake::FakeClipboard;

#[cfg(test)]
mod fake {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Clipboard the test writes to directly
    pub struct FakeClipboard {
        content: Mutex<Result<String, ClipboardError>>,
        reads: AtomicUsize,
    }

    impl FakeClipboard {
        pub fn new(initial: &str) -> Self {
            Self {
                content: Mutex::new(Ok(initial.to_string())),
                reads: AtomicUsize::new(0),
            }
        }

        pub fn denied() -> Self {
            Self {
                content: Mutex::new(Err(ClipboardError::Unavailable("permission denied".into()))),
                reads: AtomicUsize::new(0),
            }
        }

        pub fn copy(&self, text: &str) {
            *self.content.lock().unwrap() = Ok(text.to_string());
        }

        pub fn fail(&self, err: ClipboardError) {
            *self.content.lock().unwrap() = Err(err);
        }

        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl ClipboardSource for FakeClipboard {
        fn read_text(&self) -> Result<String, ClipboardError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.content.lock().unwrap().clone()
        }
    }
}
