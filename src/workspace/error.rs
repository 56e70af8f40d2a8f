use crate::client::ApiError;
use thiserror::Error;

/// Failures the workspace controller surfaces to the user. None of them are
/// fatal: the workspace view degrades and the rest of the app keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    /// Service still booting; retried silently
    #[error("service is not ready yet")]
    TransientInfra,
    #[error("clipboard access denied; enter flags manually")]
    PermissionDenied,
    #[error("Authentication required. Please log in.")]
    AuthRequired,
    #[error("Incorrect flag. Try again!")]
    Incorrect,
    #[error("{0}. Try refreshing the workspace.")]
    Timeout(String),
    #[error("{0}. Please try again.")]
    NetworkError(String),
    #[error("no challenge is active")]
    NoActiveChallenge,
    #[error("failed to start challenge: {0}")]
    StartFailed(String),
    /// The dojo answered but refused the request
    #[error("{0}")]
    Rejected(String),
}

impl From<ApiError> for WorkspaceError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => WorkspaceError::AuthRequired,
            other => WorkspaceError::NetworkError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_errors_map_to_user_facing_taxonomy() {
        assert_eq!(WorkspaceError::from(ApiError::Unauthorized), WorkspaceError::AuthRequired);
        assert!(matches!(
            WorkspaceError::from(ApiError::Timeout),
            WorkspaceError::NetworkError(_)
        ));
        assert_eq!(
            WorkspaceError::from(ApiError::Transport("connection refused".into())).to_string(),
            "network error: connection refused. Please try again."
        );
    }
}
