use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status string returned by the scoring endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[serde(alias = "correct")]
    Solved,
    Incorrect,
    AlreadySolved,
    AuthenticationRequired,
}

/// Outcome of a completed flag submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionResult {
    FreshSuccess,
    AlreadySolved,
    Incorrect,
    AuthRequired,
}

impl SubmissionResult {
    pub fn from_status(success: bool, status: Option<SubmissionStatus>) -> Self {
        match status {
            Some(SubmissionStatus::AuthenticationRequired) => SubmissionResult::AuthRequired,
            Some(SubmissionStatus::AlreadySolved) => SubmissionResult::AlreadySolved,
            Some(SubmissionStatus::Incorrect) => SubmissionResult::Incorrect,
            Some(SubmissionStatus::Solved) => SubmissionResult::FreshSuccess,
            None if success => SubmissionResult::FreshSuccess,
            None => SubmissionResult::Incorrect,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionResult::FreshSuccess | SubmissionResult::AlreadySolved)
    }

    pub fn message(&self) -> &'static str {
        match self {
            SubmissionResult::FreshSuccess => "Correct flag! Well done!",
            SubmissionResult::AlreadySolved => "Challenge already solved!",
            SubmissionResult::Incorrect => "Incorrect flag. Try again!",
            SubmissionResult::AuthRequired => "Authentication required. Please log in.",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SubmissionResult::FreshSuccess => "Congratulations!",
            SubmissionResult::AlreadySolved => "Already Solved",
            SubmissionResult::Incorrect => "Incorrect Flag",
            SubmissionResult::AuthRequired => "Log In Required",
        }
    }
}

/// Where a submitted flag came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagSource {
    Manual,
    Clipboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackStatus {
    Success,
    Error,
}

/// Actions a popup offers the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupAction {
    Submit,
    Dismiss,
    NextChallenge,
    LogIn,
    Close,
}

/// Exactly one popup shape is visible at a time
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PopupState {
    #[default]
    None,
    ClipboardDetection {
        flag: String,
    },
    SubmissionResult {
        flag: String,
        result: SubmissionResult,
    },
    RegularFeedback {
        status: FeedbackStatus,
        message: String,
        /// None when the submission never reached the scoring service
        result: Option<SubmissionResult>,
    },
}

impl PopupState {
    pub fn is_visible(&self) -> bool {
        !matches!(self, PopupState::None)
    }

    pub fn actions(&self) -> Vec<PopupAction> {
        match self {
            PopupState::None => Vec::new(),
            PopupState::ClipboardDetection { .. } => vec![PopupAction::Submit, PopupAction::Dismiss],
            PopupState::SubmissionResult { result, .. } => match result {
                SubmissionResult::FreshSuccess => {
                    vec![PopupAction::NextChallenge, PopupAction::Dismiss]
                }
                SubmissionResult::AuthRequired => vec![PopupAction::LogIn, PopupAction::Dismiss],
                SubmissionResult::AlreadySolved | SubmissionResult::Incorrect => {
                    vec![PopupAction::Dismiss]
                }
            },
            PopupState::RegularFeedback { result, .. } => match result {
                Some(SubmissionResult::FreshSuccess) => {
                    vec![PopupAction::NextChallenge, PopupAction::Close]
                }
                Some(SubmissionResult::AuthRequired) => vec![PopupAction::LogIn, PopupAction::Close],
                _ => vec![PopupAction::Close],
            },
        }
    }

    pub fn offers(&self, action: PopupAction) -> bool {
        self.actions().contains(&action)
    }
}

/// How long each popup shape stays up before auto-hiding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HideDelays {
    pub detection: Duration,
    pub clipboard_success: Duration,
    pub manual_success: Duration,
    pub error: Duration,
}

impl HideDelays {
    pub fn for_result(&self, result: SubmissionResult, source: FlagSource) -> Duration {
        if !result.is_success() {
            return self.error;
        }
        match source {
            FlagSource::Clipboard => self.clipboard_success,
            FlagSource::Manual => self.manual_success,
        }
    }
}

impl Default for HideDelays {
    fn default() -> Self {
        Self {
            detection: Duration::from_secs(15),
            clipboard_success: Duration::from_secs(10),
            manual_success: Duration::from_secs(8),
            error: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let parse = |s: &str| serde_json::from_str::<SubmissionStatus>(&format!("\"{s}\"")).unwrap();
        assert_eq!(parse("solved"), SubmissionStatus::Solved);
        assert_eq!(parse("correct"), SubmissionStatus::Solved);
        assert_eq!(parse("already_solved"), SubmissionStatus::AlreadySolved);
        assert_eq!(parse("authentication_required"), SubmissionStatus::AuthenticationRequired);
        assert_eq!(parse("incorrect"), SubmissionStatus::Incorrect);
    }

    #[test]
    fn test_only_fresh_success_offers_next() {
        let fresh = PopupState::SubmissionResult {
            flag: "pwn.college{a}".to_string(),
            result: SubmissionResult::FreshSuccess,
        };
        let already = PopupState::SubmissionResult {
            flag: "pwn.college{a}".to_string(),
            result: SubmissionResult::AlreadySolved,
        };
        assert!(fresh.offers(PopupAction::NextChallenge));
        assert!(!already.offers(PopupAction::NextChallenge));
        assert!(!PopupState::None.is_visible());
    }

    #[test]
    fn test_hide_delays() {
        let delays = HideDelays::default();
        assert_eq!(
            delays.for_result(SubmissionResult::AlreadySolved, FlagSource::Clipboard),
            Duration::from_secs(10)
        );
        assert_eq!(
            delays.for_result(SubmissionResult::FreshSuccess, FlagSource::Manual),
            Duration::from_secs(8)
        );
        assert_eq!(
            delays.for_result(SubmissionResult::Incorrect, FlagSource::Clipboard),
            Duration::from_secs(5)
        );
    }
}
