use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{CompletionError, DirectCompletion};

pub const DEFAULT_COMPLETION_MODEL: &str = "text-davinci-003";
pub const DEFAULT_TEMPERATURE: f32 = 0.9;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TOP_P: f32 = 1.0;
pub const DEFAULT_FREQUENCY_PENALTY: f32 = 0.0;
pub const DEFAULT_PRESENCE_PENALTY: f32 = 0.6;

/// Sampling policy sent with every direct completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
            frequency_penalty: DEFAULT_FREQUENCY_PENALTY,
            presence_penalty: DEFAULT_PRESENCE_PENALTY,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    #[serde(flatten)]
    sampling: &'a SamplingConfig,
}

/// Client for an OpenAI-compatible `/completions` endpoint.
#[derive(Debug, Clone)]
pub struct HttpDirectCompletion {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    sampling: SamplingConfig,
}

impl HttpDirectCompletion {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        sampling: SamplingConfig,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            sampling,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl DirectCompletion for HttpDirectCompletion {
    async fn complete(&self, query: &str) -> Result<String, CompletionError> {
        let body = CompletionRequest {
            prompt: query,
            sampling: &self.sampling,
        };

        debug!(model = %self.sampling.model, "requesting direct completion");
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::CompletionBackend(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "direct completion returned non-success status");
            return Err(CompletionError::CompletionBackend(format!(
                "status {}: {}",
                status, body
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| CompletionError::CompletionBackend(e.to_string()))?;
        first_candidate_text(&payload)
    }
}

/// Text of the first candidate; empty or absent text counts as missing.
pub(crate) fn first_candidate_text(payload: &Value) -> Result<String, CompletionError> {
    payload
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("text"))
        .and_then(|v| v.as_str())
        .filter(|text| !text.is_empty())
        .map(ToString::to_string)
        .ok_or(CompletionError::MissingCompletion)
}
