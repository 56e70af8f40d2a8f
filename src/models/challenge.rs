use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a challenge by its dojo/module/challenge ids
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeRef {
    pub dojo_id: String,
    pub module_id: String,
    pub challenge_id: String,
}

impl ChallengeRef {
    pub fn new(
        dojo_id: impl Into<String>,
        module_id: impl Into<String>,
        challenge_id: impl Into<String>,
    ) -> Self {
        Self {
            dojo_id: dojo_id.into(),
            module_id: module_id.into(),
            challenge_id: challenge_id.into(),
        }
    }

    pub fn module_path(&self) -> String {
        format!("/dojo/{}/module/{}", self.dojo_id, self.module_id)
    }

    /// Path of the workspace overlay for this challenge
    pub fn workspace_path(&self) -> String {
        format!("{}/workspace/challenge/{}", self.module_path(), self.challenge_id)
    }
}

impl fmt::Display for ChallengeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.dojo_id, self.module_id, self.challenge_id)
    }
}

/// Human-readable names fetched lazily after the ids are known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMetadata {
    pub dojo_name: String,
    pub module_name: String,
    pub challenge_name: String,
}

/// The challenge currently open in the workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveChallenge {
    pub dojo_id: String,
    pub module_id: String,
    pub challenge_id: String,
    pub challenge_name: String,
    pub dojo_name: String,
    pub module_name: String,
    /// True between "start requested" and "readiness confirmed"
    #[serde(default)]
    pub is_starting: bool,
    /// Privileged (non-scoring) sandbox
    #[serde(default)]
    pub practice: bool,
}

impl ActiveChallenge {
    /// Ids stand in for names until metadata arrives
    pub fn placeholder(challenge: &ChallengeRef) -> Self {
        Self {
            dojo_id: challenge.dojo_id.clone(),
            module_id: challenge.module_id.clone(),
            challenge_id: challenge.challenge_id.clone(),
            challenge_name: challenge.challenge_id.clone(),
            dojo_name: challenge.dojo_id.clone(),
            module_name: challenge.module_id.clone(),
            is_starting: false,
            practice: false,
        }
    }

    pub fn starting(mut self, practice: bool) -> Self {
        self.is_starting = true;
        self.practice = practice;
        self
    }

    pub fn reference(&self) -> ChallengeRef {
        ChallengeRef::new(&self.dojo_id, &self.module_id, &self.challenge_id)
    }

    pub fn is(&self, challenge: &ChallengeRef) -> bool {
        self.dojo_id == challenge.dojo_id
            && self.module_id == challenge.module_id
            && self.challenge_id == challenge.challenge_id
    }

    /// Patch names without touching ids or flags
    pub fn apply_metadata(&mut self, metadata: ChallengeMetadata) {
        self.dojo_name = metadata.dojo_name;
        self.module_name = metadata.module_name;
        self.challenge_name = metadata.challenge_name;
    }

    pub fn display_name(&self) -> String {
        format!("{} / {} / {}", self.dojo_name, self.module_name, self.challenge_name)
    }
}
