//! Scriptable in-memory collaborators for controller tests.

use super::{
    ActionResponse, ApiError, CurrentChallenge, DojoApi, NextResponse, ProbeOutcome, ServiceProbe,
    SubmitResponse, WorkspaceResponse,
};
use crate::models::{ChallengeMetadata, ChallengeRef, Service, SubmissionStatus};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start(ChallengeRef, bool),
    Terminate,
    CurrentChallenge,
    Workspace(Service),
    ResetHome,
    Submit(ChallengeRef, String),
    Next,
    Metadata(ChallengeRef),
}

#[derive(Default)]
pub struct FakeDojoApi {
    pub calls: Mutex<Vec<Call>>,
    pub latency: Duration,
    pub start_results: Mutex<VecDeque<Result<ActionResponse, ApiError>>>,
    pub terminate_result: Mutex<Option<Result<ActionResponse, ApiError>>>,
    pub current: Mutex<Option<CurrentChallenge>>,
    pub workspaces: Mutex<HashMap<Service, WorkspaceResponse>>,
    pub submit_results: Mutex<VecDeque<Result<SubmitResponse, ApiError>>>,
    pub next_result: Mutex<Option<Result<NextResponse, ApiError>>>,
    pub metadata: Mutex<HashMap<String, ChallengeMetadata>>,
}

impl FakeDojoApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matcher: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matcher(c)).count()
    }

    pub fn push_start(&self, result: Result<ActionResponse, ApiError>) {
        self.start_results.lock().unwrap().push_back(result);
    }

    pub fn push_submit(&self, result: Result<SubmitResponse, ApiError>) {
        self.submit_results.lock().unwrap().push_back(result);
    }

    pub fn push_status(&self, success: bool, status: SubmissionStatus) {
        self.push_submit(Ok(SubmitResponse {
            success,
            status: Some(status),
            message: None,
        }));
    }

    pub fn set_next(&self, result: Result<NextResponse, ApiError>) {
        *self.next_result.lock().unwrap() = Some(result);
    }

    pub fn set_workspace(&self, service: Service, iframe_src: Option<&str>) {
        self.workspaces.lock().unwrap().insert(
            service,
            WorkspaceResponse {
                active: true,
                iframe_src: iframe_src.map(str::to_string),
                ..WorkspaceResponse::default()
            },
        );
    }

    pub fn set_metadata(&self, challenge: &ChallengeRef, metadata: ChallengeMetadata) {
        self.metadata
            .lock()
            .unwrap()
            .insert(challenge.to_string(), metadata);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl DojoApi for FakeDojoApi {
    async fn start(&self, challenge: &ChallengeRef, practice: bool) -> Result<ActionResponse, ApiError> {
        self.record(Call::Start(challenge.clone(), practice));
        self.delay().await;
        self.start_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ActionResponse::ok()))
    }

    async fn terminate(&self) -> Result<ActionResponse, ApiError> {
        self.record(Call::Terminate);
        self.delay().await;
        self.terminate_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(ActionResponse::ok()))
    }

    async fn current_challenge(&self) -> Result<Option<CurrentChallenge>, ApiError> {
        self.record(Call::CurrentChallenge);
        self.delay().await;
        Ok(self.current.lock().unwrap().clone())
    }

    async fn workspace(&self, service: Service) -> Result<WorkspaceResponse, ApiError> {
        self.record(Call::Workspace(service));
        self.delay().await;
        Ok(self
            .workspaces
            .lock()
            .unwrap()
            .get(&service)
            .cloned()
            .unwrap_or_else(|| WorkspaceResponse {
                active: true,
                iframe_src: Some(format!("/workspace/{service}/")),
                ..WorkspaceResponse::default()
            }))
    }

    async fn reset_home(&self) -> Result<ActionResponse, ApiError> {
        self.record(Call::ResetHome);
        self.delay().await;
        Ok(ActionResponse::ok())
    }

    async fn submit(&self, challenge: &ChallengeRef, flag: &str) -> Result<SubmitResponse, ApiError> {
        self.record(Call::Submit(challenge.clone(), flag.to_string()));
        self.delay().await;
        self.submit_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SubmitResponse {
                success: false,
                status: Some(SubmissionStatus::Incorrect),
                message: None,
            }))
    }

    async fn next(&self) -> Result<NextResponse, ApiError> {
        self.record(Call::Next);
        self.delay().await;
        self.next_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(NextResponse::default()))
    }

    async fn metadata(&self, challenge: &ChallengeRef) -> Result<Option<ChallengeMetadata>, ApiError> {
        self.record(Call::Metadata(challenge.clone()));
        self.delay().await;
        Ok(self.metadata.lock().unwrap().get(&challenge.to_string()).cloned())
    }
}

/// Probe that replays a script of outcomes, then repeats the last one
pub struct ScriptedProbe {
    script: Mutex<VecDeque<ProbeOutcome>>,
    last: Mutex<ProbeOutcome>,
    pub probed: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub fn new(script: Vec<ProbeOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(ProbeOutcome::NotReady(502)),
            probed: Mutex::new(Vec::new()),
        }
    }

    pub fn always(outcome: ProbeOutcome) -> Self {
        let probe = Self::new(Vec::new());
        *probe.last.lock().unwrap() = outcome;
        probe
    }

    pub fn count(&self) -> usize {
        self.probed.lock().unwrap().len()
    }

    pub fn count_for(&self, url: &str) -> usize {
        self.probed.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl ServiceProbe for ScriptedProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        self.probed.lock().unwrap().push(url.to_string());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(outcome) => {
                *self.last.lock().unwrap() = outcome.clone();
                outcome
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}
