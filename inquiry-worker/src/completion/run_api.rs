//! Workflow engine API for managed runs.
//!
//! Two calls: submit a non-blocking run of a persona's workflow, and fetch a
//! run's current status. Both return the same run envelope.

use std::sync::Arc;

use async_trait::async_trait;
use inquiry_types::RunState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type SharedRunApi = Arc<dyn RunApi>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSubmission {
    pub specification_hash: String,
    pub config: Value,
    pub blocking: bool,
    pub inputs: Vec<RunInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunInput {
    pub question: String,
}

/// Decoded view of a run envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub run_id: String,
    pub status: RunState,
    /// Raw `results` matrix; only inspected once the run has succeeded.
    pub results: Value,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    run: RunBody,
}

#[derive(Debug, Deserialize)]
struct RunBody {
    run_id: String,
    status: RunStatusBody,
    #[serde(default)]
    results: Value,
}

#[derive(Debug, Deserialize)]
struct RunStatusBody {
    run: RunState,
}

impl From<RunEnvelope> for RunSnapshot {
    fn from(envelope: RunEnvelope) -> Self {
        Self {
            run_id: envelope.run.run_id,
            status: envelope.run.status.run,
            results: envelope.run.results,
        }
    }
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum RunApiError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("response decode failed: {0}")]
    Decode(String),
}

#[async_trait]
pub trait RunApi: Send + Sync {
    async fn submit(
        &self,
        persona_id: &str,
        submission: &RunSubmission,
    ) -> Result<RunSnapshot, RunApiError>;

    async fn fetch(&self, persona_id: &str, run_id: &str) -> Result<RunSnapshot, RunApiError>;
}

/// Bearer-authenticated HTTP client for the workflow engine.
#[derive(Debug, Clone)]
pub struct HttpRunApi {
    http: reqwest::Client,
    base_url: String,
    owner: String,
    api_key: String,
}

impl HttpRunApi {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        owner: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            owner: owner.into(),
            api_key: api_key.into(),
        }
    }

    fn runs_url(&self, persona_id: &str) -> String {
        format!(
            "{}/{}/{}/runs",
            self.base_url.trim_end_matches('/'),
            self.owner,
            persona_id
        )
    }

    async fn read_snapshot(response: reqwest::Response) -> Result<RunSnapshot, RunApiError> {
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RunApiError::Status { code, body });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RunApiError::Transport(e.to_string()))?;
        let envelope: RunEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| RunApiError::Decode(e.to_string()))?;
        Ok(envelope.into())
    }
}

#[async_trait]
impl RunApi for HttpRunApi {
    async fn submit(
        &self,
        persona_id: &str,
        submission: &RunSubmission,
    ) -> Result<RunSnapshot, RunApiError> {
        let response = self
            .http
            .post(self.runs_url(persona_id))
            .bearer_auth(&self.api_key)
            .json(submission)
            .send()
            .await
            .map_err(|e| RunApiError::Transport(e.to_string()))?;
        Self::read_snapshot(response).await
    }

    async fn fetch(&self, persona_id: &str, run_id: &str) -> Result<RunSnapshot, RunApiError> {
        let response = self
            .http
            .get(format!("{}/{}", self.runs_url(persona_id), run_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| RunApiError::Transport(e.to_string()))?;
        Self::read_snapshot(response).await
    }
}
