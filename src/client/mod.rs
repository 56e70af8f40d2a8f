//! Collaborators the workspace controller drives: sandbox control, service
//! access, scoring and progression, all over the dojo HTTP API.

#[cfg(test)]
pub mod fake;
mod http;
mod types;

pub use http::{HttpDojoApi, HttpServiceProbe};
pub use types::{
    ActionResponse, CurrentChallenge, NextResponse, ProbeOutcome, SubmitResponse,
    WorkspaceResponse,
};

use crate::models::{ChallengeMetadata, ChallengeRef, Service};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("authentication required")]
    Unauthorized,
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// The dojo backend as seen by the workspace controller
#[async_trait]
pub trait DojoApi: Send + Sync {
    /// Create or reuse the sandbox for a challenge
    async fn start(&self, challenge: &ChallengeRef, practice: bool) -> Result<ActionResponse, ApiError>;

    async fn terminate(&self) -> Result<ActionResponse, ApiError>;

    /// The challenge whose sandbox is currently running, if any
    async fn current_challenge(&self) -> Result<Option<CurrentChallenge>, ApiError>;

    async fn workspace(&self, service: Service) -> Result<WorkspaceResponse, ApiError>;

    async fn reset_home(&self) -> Result<ActionResponse, ApiError>;

    async fn submit(&self, challenge: &ChallengeRef, flag: &str) -> Result<SubmitResponse, ApiError>;

    async fn next(&self) -> Result<NextResponse, ApiError>;

    /// Dojo, module and challenge names; `None` when the ids are unknown
    async fn metadata(&self, challenge: &ChallengeRef) -> Result<Option<ChallengeMetadata>, ApiError>;
}

/// Lightweight existence check against an embedded service
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}
