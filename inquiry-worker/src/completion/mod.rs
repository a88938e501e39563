//! Completion strategies for an inquiry.
//!
//! A request without a persona goes to the direct completion service; a
//! request with a persona is executed as a managed run of that persona's
//! workflow. Both backends sit behind async traits so the orchestrator can be
//! wired with fakes.

pub mod backoff;
pub mod direct;
pub mod managed_run;
pub mod run_api;

use std::sync::Arc;

use async_trait::async_trait;
use inquiry_types::{InquiryRequest, PersonaRef};

pub type SharedDirectCompletion = Arc<dyn DirectCompletion>;
pub type SharedManagedRunCompletion = Arc<dyn ManagedRunCompletion>;

/// Single synchronous call to a general-purpose text-generation service.
#[async_trait]
pub trait DirectCompletion: Send + Sync {
    async fn complete(&self, query: &str) -> Result<String, CompletionError>;
}

/// Asynchronous execution of a persona workflow, awaited to a terminal state.
#[async_trait]
pub trait ManagedRunCompletion: Send + Sync {
    async fn complete(&self, persona: &PersonaRef, query: &str) -> Result<String, CompletionError>;
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum CompletionError {
    /// The completion service answered without any candidate text.
    #[error("completion response is missing candidate text")]
    MissingCompletion,
    #[error("completion backend request failed: {0}")]
    CompletionBackend(String),
    #[error("persona config is not valid JSON: {0}")]
    PersonaConfig(String),
    #[error("managed run submission failed: {0}")]
    Submission(String),
    #[error("managed run {run_id} errored")]
    RunFailed { run_id: String },
    #[error("managed run {run_id} still running after {waited_ms}ms")]
    RunTimeout { run_id: String, waited_ms: u64 },
    #[error("managed run result could not be decoded: {0}")]
    Decode(String),
    #[error("polling managed run {run_id} failed: {message}")]
    RunPoll { run_id: String, message: String },
}

impl CompletionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCompletion => "MISSING_COMPLETION",
            Self::CompletionBackend(_) => "COMPLETION_BACKEND",
            Self::PersonaConfig(_) => "PERSONA_CONFIG",
            Self::Submission(_) => "SUBMISSION",
            Self::RunFailed { .. } => "RUN_FAILED",
            Self::RunTimeout { .. } => "RUN_TIMEOUT",
            Self::Decode(_) => "DECODE",
            Self::RunPoll { .. } => "RUN_POLL",
        }
    }
}

/// Runnable completion strategy chosen for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStrategy<'a> {
    Direct {
        query: &'a str,
    },
    ManagedRun {
        persona: &'a PersonaRef,
        query: &'a str,
    },
}

impl CompletionStrategy<'_> {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::ManagedRun { .. } => "managed_run",
        }
    }
}

/// Persona absent selects direct completion; persona present selects a
/// managed run with the persona passed through unchanged.
pub fn select_strategy(request: &InquiryRequest) -> CompletionStrategy<'_> {
    match request.persona.as_ref() {
        None => CompletionStrategy::Direct {
            query: &request.query,
        },
        Some(persona) => CompletionStrategy::ManagedRun {
            persona,
            query: &request.query,
        },
    }
}
