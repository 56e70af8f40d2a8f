use super::types::{
    ActionResponse, DojoListResponse, ModulesResponse, NextResponse, ProbeOutcome, StartRequest,
    SubmitRequest, SubmitResponse, WorkspaceResponse,
};
use super::{ApiError, CurrentChallenge, DojoApi, ServiceProbe};
use crate::config::ServerSettings;
use crate::models::{ChallengeMetadata, ChallengeRef, Service};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

fn build_client(settings: &ServerSettings) -> Result<reqwest::Client, ApiError> {
    let mut headers = HeaderMap::new();
    if let Some(session) = &settings.session {
        let cookie = HeaderValue::from_str(&format!("session={session}"))
            .map_err(|e| ApiError::Transport(format!("invalid session cookie: {e}")))?;
        headers.insert(COOKIE, cookie);
    }

    reqwest::Client::builder()
        .timeout(settings.request_timeout())
        .default_headers(headers)
        .build()
        .map_err(ApiError::from)
}

/// `reqwest`-backed client for the dojo API
pub struct HttpDojoApi {
    client: reqwest::Client,
    base: String,
}

impl HttpDojoApi {
    pub fn new(settings: &ServerSettings) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_client(settings)?,
            base: settings.api_base(),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base, endpoint);
        debug!(%method, %url, "dojo api request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let parsed = serde_json::from_slice::<serde_json::Value>(&bytes).ok();

            // A body carrying `success` is a structured reply even on error statuses
            if let Some(value) = parsed.as_ref().filter(|v| v.get("success").is_some()) {
                return serde_json::from_value(value.clone())
                    .map_err(|e| ApiError::Decode(e.to_string()));
            }
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(ApiError::Unauthorized);
            }

            let message = parsed
                .as_ref()
                .and_then(|v| v["message"].as_str().or(v["error"].as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request(Method::GET, endpoint, None::<&()>).await
    }
}

#[async_trait]
impl DojoApi for HttpDojoApi {
    async fn start(&self, challenge: &ChallengeRef, practice: bool) -> Result<ActionResponse, ApiError> {
        let body = StartRequest {
            dojo: &challenge.dojo_id,
            module: &challenge.module_id,
            challenge: &challenge.challenge_id,
            practice,
        };
        self.request(Method::POST, "/docker", Some(&body)).await
    }

    async fn terminate(&self) -> Result<ActionResponse, ApiError> {
        self.request(Method::DELETE, "/docker", None::<&()>).await
    }

    async fn current_challenge(&self) -> Result<Option<CurrentChallenge>, ApiError> {
        let response: WorkspaceResponse = self.get("/workspace").await?;
        Ok(response.current_challenge)
    }

    async fn workspace(&self, service: Service) -> Result<WorkspaceResponse, ApiError> {
        self.get(&format!("/workspace?service={}", service.as_str())).await
    }

    async fn reset_home(&self) -> Result<ActionResponse, ApiError> {
        self.request(Method::POST, "/workspace/reset_home", None::<&()>).await
    }

    async fn submit(&self, challenge: &ChallengeRef, flag: &str) -> Result<SubmitResponse, ApiError> {
        let endpoint = format!(
            "/dojos/{}/{}/{}/solve",
            challenge.dojo_id, challenge.module_id, challenge.challenge_id
        );
        let body = SubmitRequest {
            submission: flag.trim(),
        };
        self.request(Method::POST, &endpoint, Some(&body)).await
    }

    async fn next(&self) -> Result<NextResponse, ApiError> {
        self.get("/docker/next").await
    }

    async fn metadata(&self, challenge: &ChallengeRef) -> Result<Option<ChallengeMetadata>, ApiError> {
        let modules_endpoint = format!("/dojos/{}/modules", challenge.dojo_id);
        let (dojos, modules) = tokio::join!(
            self.get::<DojoListResponse>("/dojos"),
            self.get::<ModulesResponse>(&modules_endpoint),
        );
        let (dojos, modules) = (dojos?, modules?);

        let Some(dojo) = dojos.dojos.into_iter().find(|d| d.id == challenge.dojo_id) else {
            return Ok(None);
        };
        let Some(module) = modules.modules.into_iter().find(|m| m.id == challenge.module_id) else {
            return Ok(None);
        };
        let Some(entry) = module.challenges.iter().find(|c| c.id == challenge.challenge_id) else {
            return Ok(None);
        };

        Ok(Some(ChallengeMetadata {
            dojo_name: dojo.name,
            challenge_name: entry.name.clone().unwrap_or_else(|| entry.id.clone()),
            module_name: module.name,
        }))
    }
}

/// Issues HEAD requests against embedded service URLs
pub struct HttpServiceProbe {
    client: reqwest::Client,
}

impl HttpServiceProbe {
    pub fn new(settings: &ServerSettings) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_client(settings)?,
        })
    }
}

#[async_trait]
impl ServiceProbe for HttpServiceProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        match self.client.head(url).send().await {
            Ok(response) => ProbeOutcome::from_status(response.status().as_u16()),
            Err(e) => ProbeOutcome::Unreachable(e.to_string()),
        }
    }
}
