use crate::models::{ChallengeRef, SubmissionStatus};
use serde::{Deserialize, Serialize};

/// Generic `{success, error?, message?}` reply from control endpoints
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            message: None,
        }
    }

    pub fn error_text(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartRequest<'a> {
    pub dojo: &'a str,
    pub module: &'a str,
    pub challenge: &'a str,
    pub practice: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentChallenge {
    pub dojo_id: String,
    pub module_id: String,
    pub challenge_id: String,
    #[serde(default)]
    pub challenge_name: Option<String>,
}

impl CurrentChallenge {
    pub fn reference(&self) -> ChallengeRef {
        ChallengeRef::new(&self.dojo_id, &self.module_id, &self.challenge_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkspaceResponse {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub iframe_src: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub current_challenge: Option<CurrentChallenge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitRequest<'a> {
    pub submission: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(default)]
    pub status: Option<SubmissionStatus>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NextResponse {
    pub success: bool,
    #[serde(default)]
    pub dojo: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl NextResponse {
    /// The next challenge, if the progression service named one completely
    pub fn target(&self) -> Option<ChallengeRef> {
        if !self.success {
            return None;
        }
        match (&self.dojo, &self.module, &self.challenge) {
            (Some(dojo), Some(module), Some(challenge)) => {
                Some(ChallengeRef::new(dojo, module, challenge))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DojoSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DojoListResponse {
    #[serde(default)]
    pub dojos: Vec<DojoSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub challenges: Vec<ChallengeSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModulesResponse {
    #[serde(default)]
    pub modules: Vec<ModuleSummary>,
}

/// Result of one HEAD-style readiness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ready,
    /// Bad-gateway class: the service is still booting
    NotReady(u16),
    Unexpected(u16),
    /// Transport or cross-origin failure; nothing can be inferred
    Unreachable(String),
}

impl ProbeOutcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => ProbeOutcome::Ready,
            502 | 503 | 504 => ProbeOutcome::NotReady(status),
            other => ProbeOutcome::Unexpected(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_target_requires_all_ids() {
        let partial = NextResponse {
            success: true,
            dojo: Some("intro".into()),
            module: None,
            challenge: Some("hello".into()),
            error: None,
        };
        assert_eq!(partial.target(), None);

        let full = NextResponse {
            module: Some("basics".into()),
            ..partial
        };
        assert_eq!(full.target(), Some(ChallengeRef::new("intro", "basics", "hello")));
    }

    #[test]
    fn test_probe_status_classes() {
        assert_eq!(ProbeOutcome::from_status(204), ProbeOutcome::Ready);
        assert_eq!(ProbeOutcome::from_status(502), ProbeOutcome::NotReady(502));
        assert_eq!(ProbeOutcome::from_status(503), ProbeOutcome::NotReady(503));
        assert_eq!(ProbeOutcome::from_status(404), ProbeOutcome::Unexpected(404));
    }

    #[test]
    fn test_workspace_response_tolerates_sparse_json() {
        let parsed: WorkspaceResponse = serde_json::from_str(r#"{"active": false}"#).unwrap();
        assert!(!parsed.active);
        assert!(parsed.iframe_src.is_none());
    }
}
