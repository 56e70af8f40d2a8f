use super::clipboard::SharedMemory;
use super::ledger::SolveLedger;
use super::store::SessionStore;
use super::timer::TaskSlot;
use super::{WorkspaceError, WorkspaceEvent};
use crate::client::{ApiError, DojoApi};
use crate::models::{
    FeedbackStatus, FlagGrammar, FlagSource, HideDelays, PopupState, SubmissionResult,
};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

const SUBMIT_FAILED: &str = "Failed to submit flag. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitPhase {
    #[default]
    Idle,
    Submitting,
    Success,
    Error,
}

/// What the flag input and its popup render from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionView {
    pub input: String,
    pub phase: SubmitPhase,
    pub message: String,
    pub popup: PopupState,
}

impl SubmissionView {
    pub fn input_is_flag(&self, grammar: &FlagGrammar) -> bool {
        !self.input.is_empty() && grammar.matches(&self.input)
    }
}

pub struct SubmissionDeps {
    pub api: Arc<dyn DojoApi>,
    pub store: SessionStore,
    pub grammar: FlagGrammar,
    pub debounce: Duration,
    pub delays: HideDelays,
    pub memory: SharedMemory,
    pub ledger: Arc<SolveLedger>,
    pub events: broadcast::Sender<WorkspaceEvent>,
}

struct Inner {
    deps: SubmissionDeps,
    view: watch::Sender<SubmissionView>,
    popup_slot: TaskSlot,
    debounce_slot: TaskSlot,
}

/// Turns typed or clipboard-detected flags into submissions and owns the
/// single popup. Every popup transition replaces the previous auto-hide
/// timer, so at most one is ever pending.
#[derive(Clone)]
pub struct FlagSubmission {
    inner: Arc<Inner>,
}

impl FlagSubmission {
    pub fn new(deps: SubmissionDeps) -> Self {
        let (view, _) = watch::channel(SubmissionView::default());
        Self {
            inner: Arc::new(Inner {
                deps,
                view,
                popup_slot: TaskSlot::new(),
                debounce_slot: TaskSlot::new(),
            }),
        }
    }

    pub fn view(&self) -> SubmissionView {
        self.inner.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionView> {
        self.inner.view.subscribe()
    }

    pub fn popup(&self) -> PopupState {
        self.inner.view.borrow().popup.clone()
    }

    pub fn popup_visible(&self) -> bool {
        self.inner.view.borrow().popup.is_visible()
    }

    pub fn grammar(&self) -> &FlagGrammar {
        &self.inner.deps.grammar
    }

    /// Replace the typed value. A complete flag is submitted once the input
    /// has been left alone for the debounce period.
    pub fn set_input(&self, text: &str) {
        let text = text.to_string();
        self.inner.view.send_modify(|v| v.input = text.clone());

        if !self.inner.deps.grammar.matches(&text) {
            self.inner.debounce_slot.cancel();
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.deps.debounce;
        self.inner.debounce_slot.schedule(move |generation| async move {
            tokio::time::sleep(delay).await;
            if !generation.is_current() {
                return;
            }
            // Detached so a later keystroke cannot abort a request in flight
            tokio::spawn(async move {
                if let Some(inner) = weak.upgrade() {
                    let _ = inner.submit(&text, FlagSource::Manual).await;
                }
            });
        });
    }

    /// Enter: submit whatever is typed, skipping the debounce
    pub async fn submit_input(&self) -> Result<Option<SubmissionResult>, WorkspaceError> {
        self.inner.debounce_slot.cancel();
        let input = self.inner.view.borrow().input.clone();
        self.inner.submit(&input, FlagSource::Manual).await
    }

    /// Esc
    pub fn clear_input(&self) {
        self.inner.debounce_slot.cancel();
        self.inner.view.send_modify(|v| v.input.clear());
    }

    pub async fn submit(
        &self,
        flag: &str,
        source: FlagSource,
    ) -> Result<Option<SubmissionResult>, WorkspaceError> {
        self.inner.submit(flag, source).await
    }

    /// Show the detection popup for a flag the clipboard monitor surfaced
    pub fn on_clipboard_flag(&self, flag: String) {
        if self.popup_visible() {
            debug!("popup already open, ignoring clipboard flag");
            return;
        }
        if let Ok(mut memory) = self.inner.deps.memory.lock() {
            memory.mark_processed(&flag);
        }
        let hide_after = self.inner.deps.delays.detection;
        self.inner.show(PopupState::ClipboardDetection { flag }, hide_after);
    }

    /// Submit the flag shown in the detection popup
    pub async fn accept_clipboard(&self) -> Result<Option<SubmissionResult>, WorkspaceError> {
        let PopupState::ClipboardDetection { flag } = self.popup() else {
            return Ok(None);
        };
        // The popup and its hide timer stay until the earlier request lands
        if self.view().phase == SubmitPhase::Submitting {
            debug!("submission already in flight, keeping detection popup");
            return Ok(None);
        }
        self.inner.popup_slot.cancel();
        self.inner.view.send_modify(|v| v.input = flag.clone());
        if let Ok(mut memory) = self.inner.deps.memory.lock() {
            memory.mark_processed(&flag);
        }
        self.inner.submit(&flag, FlagSource::Clipboard).await
    }

    /// Dismiss the popup. A dismissed clipboard flag is never offered again
    /// this session.
    pub fn dismiss(&self) {
        if let PopupState::ClipboardDetection { flag } = self.popup() {
            if let Ok(mut memory) = self.inner.deps.memory.lock() {
                memory.dismiss(&flag);
            }
            info!("clipboard flag dismissed");
        }
        self.inner.close_popup();
    }

    pub fn close_popup(&self) {
        self.inner.close_popup();
    }

    /// Pending auto-hide and debounce timers
    pub fn pending_timers(&self) -> usize {
        self.inner.popup_slot.scheduled() + self.inner.debounce_slot.scheduled()
    }

    #[cfg(test)]
    pub(crate) fn popup_timers(&self) -> usize {
        self.inner.popup_slot.scheduled()
    }
}

impl Inner {
    async fn submit(
        self: &Arc<Self>,
        flag: &str,
        source: FlagSource,
    ) -> Result<Option<SubmissionResult>, WorkspaceError> {
        let flag = flag.trim().to_string();
        if flag.is_empty() {
            return Ok(None);
        }

        let Some(challenge) = self.deps.store.active_challenge() else {
            let err = WorkspaceError::NoActiveChallenge;
            self.feedback_error(err.to_string());
            return Err(err);
        };
        let challenge = challenge.reference();

        let started = self.view.send_if_modified(|v| {
            if v.phase == SubmitPhase::Submitting {
                return false;
            }
            v.phase = SubmitPhase::Submitting;
            v.message.clear();
            true
        });
        if !started {
            debug!("submission already in flight");
            return Ok(None);
        }

        info!(%challenge, ?source, "submitting flag");
        let result = match self.deps.api.submit(&challenge, &flag).await {
            Ok(response) => SubmissionResult::from_status(response.success, response.status),
            Err(ApiError::Unauthorized) => SubmissionResult::AuthRequired,
            Err(e) => {
                warn!(error = %e, %challenge, "flag submission failed");
                self.view.send_modify(|v| v.input.clear());
                self.feedback_error(SUBMIT_FAILED.to_string());
                return Err(WorkspaceError::NetworkError(e.to_string()));
            }
        };
        info!(%challenge, ?result, "submission finished");

        if result == SubmissionResult::FreshSuccess {
            let record = self.deps.ledger.record(&challenge);
            // No receivers is fine
            let _ = self.deps.events.send(WorkspaceEvent::Solved(record));
        }

        let status = if result.is_success() {
            SubmitPhase::Success
        } else {
            SubmitPhase::Error
        };
        self.view.send_modify(|v| {
            v.input.clear();
            v.phase = status;
            v.message = result.message().to_string();
        });

        let hide_after = self.deps.delays.for_result(result, source);
        match source {
            FlagSource::Clipboard => {
                self.show(PopupState::SubmissionResult { flag, result }, hide_after);
            }
            // A detection popup keeps the screen; it has its own timer
            FlagSource::Manual
                if matches!(self.view.borrow().popup, PopupState::ClipboardDetection { .. }) => {}
            FlagSource::Manual => {
                let status = if result.is_success() {
                    FeedbackStatus::Success
                } else {
                    FeedbackStatus::Error
                };
                self.show(
                    PopupState::RegularFeedback {
                        status,
                        message: result.message().to_string(),
                        result: Some(result),
                    },
                    hide_after,
                );
            }
        }

        match result {
            SubmissionResult::AuthRequired => Err(WorkspaceError::AuthRequired),
            SubmissionResult::Incorrect => Err(WorkspaceError::Incorrect),
            other => Ok(Some(other)),
        }
    }

    fn feedback_error(self: &Arc<Self>, message: String) {
        self.view.send_modify(|v| {
            v.phase = SubmitPhase::Error;
            v.message = message.clone();
        });
        self.show(
            PopupState::RegularFeedback {
                status: FeedbackStatus::Error,
                message,
                result: None,
            },
            self.deps.delays.error,
        );
    }

    /// Replace the popup, cancelling the previous hide timer first
    fn show(self: &Arc<Self>, popup: PopupState, hide_after: Duration) {
        let weak: Weak<Inner> = Arc::downgrade(self);
        self.popup_slot.schedule_after(hide_after, move || {
            if let Some(inner) = weak.upgrade() {
                inner.close_popup();
            }
        });
        self.view.send_modify(|v| v.popup = popup);
    }

    fn close_popup(&self) {
        self.popup_slot.cancel();
        self.view.send_modify(|v| {
            v.popup = PopupState::None;
            v.message.clear();
            if v.phase != SubmitPhase::Submitting {
                v.phase = SubmitPhase::Idle;
            }
        });
    }
}
