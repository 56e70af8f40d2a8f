mod challenge;
mod flag;
mod service;
mod submission;

pub use challenge::{ActiveChallenge, ChallengeMetadata, ChallengeRef};
pub use flag::{FlagGrammar, DEFAULT_FLAG_MAX_LEN, DEFAULT_FLAG_PATTERN};
pub use service::Service;
pub use submission::{
    FeedbackStatus, FlagSource, HideDelays, PopupAction, PopupState, SubmissionResult,
    SubmissionStatus,
};
