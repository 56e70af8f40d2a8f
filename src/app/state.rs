use crate::workspace::{
    MonitorPhase, ReadinessState, SessionState, SubmissionView, WorkspaceController,
    WorkspaceStatus,
};
use crate::models::{PopupState, Service};

/// Spinner frames for anything that is waiting on the dojo
pub const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Ticks a notice stays in the status bar (about 5 seconds at 50ms)
const NOTICE_TICKS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Typing into the flag input
    Flag,
    /// Typing a challenge to open
    Goto,
    Help,
    /// First `K` press, waiting for `y`
    ConfirmKill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
    pub shown_at: u64,
}

/// Everything the renderer reads. Workspace state is copied out of the
/// controller once per loop iteration so drawing never touches a lock.
pub struct AppState {
    pub input_mode: InputMode,
    pub goto_buffer: String,
    pub session: SessionState,
    pub readiness: ReadinessState,
    pub submission: SubmissionView,
    pub popup: PopupState,
    pub workspace: WorkspaceStatus,
    pub clipboard_phase: MonitorPhase,
    pub solved_total: usize,
    pub solved_in_module: usize,
    pub location: String,
    pub host: String,
    pub notice: Option<Notice>,
    pub busy: Option<&'static str>,
    pub tick: u64,
    pub terminal_size: (u16, u16),
    pub should_quit: bool,
}

impl AppState {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            input_mode: InputMode::Normal,
            goto_buffer: String::new(),
            session: SessionState::default(),
            readiness: ReadinessState::default(),
            submission: SubmissionView::default(),
            popup: PopupState::None,
            workspace: WorkspaceStatus::default(),
            clipboard_phase: MonitorPhase::Disabled,
            solved_total: 0,
            solved_in_module: 0,
            location: "/".to_string(),
            host: host.into(),
            notice: None,
            busy: None,
            tick: 0,
            terminal_size: (0, 0),
            should_quit: false,
        }
    }

    /// Copy the latest workspace state out of the controller
    pub fn sync(&mut self, controller: &WorkspaceController) {
        self.session = controller.store().snapshot();
        self.readiness = controller.prober().state();
        self.submission = controller.submission().view();
        self.popup = self.submission.popup.clone();
        self.workspace = controller.status();
        self.clipboard_phase = controller.clipboard().phase();
        self.location = controller.url().location();

        let ledger = controller.ledger();
        self.solved_total = ledger.len();
        self.solved_in_module = self
            .session
            .active_challenge
            .as_ref()
            .map(|c| ledger.solved_in_module(&c.dojo_id, &c.module_id))
            .unwrap_or(0);
    }

    pub fn tick_animation(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        if let Some(notice) = &self.notice {
            if self.tick.saturating_sub(notice.shown_at) > NOTICE_TICKS {
                self.notice = None;
            }
        }
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER[(self.tick / 2) as usize % SPINNER.len()]
    }

    pub fn notify(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            is_error: false,
            shown_at: self.tick,
        });
    }

    pub fn notify_error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            is_error: true,
            shown_at: self.tick,
        });
    }

    pub fn active_service(&self) -> Service {
        self.session.active_service
    }

    pub fn has_challenge(&self) -> bool {
        self.session.active_challenge.is_some()
    }

    /// The workspace overlay is shown (a challenge is open and not minimized)
    pub fn workspace_open(&self) -> bool {
        self.has_challenge() && !self.session.minimized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_expires_after_timeout() {
        let mut state = AppState::new("pwn.college");
        state.notify("Home directory reset");
        for _ in 0..NOTICE_TICKS {
            state.tick_animation();
        }
        assert!(state.notice.is_some());

        state.tick_animation();
        assert!(state.notice.is_none());
    }

    #[test]
    fn test_workspace_open_needs_challenge() {
        let mut state = AppState::new("pwn.college");
        assert!(!state.workspace_open());

        state.session.active_challenge = Some(crate::models::ActiveChallenge::placeholder(
            &crate::models::ChallengeRef::new("intro", "basics", "hello"),
        ));
        assert!(state.workspace_open());

        state.session.minimized = true;
        assert!(!state.workspace_open());
    }
}
