//! Managed-run completion: submit a persona workflow run, then poll it to a
//! terminal state.
//!
//! Run lifecycle:
//! 1) SUBMITTING - one non-blocking submission; never retried
//! 2) POLLING    - fetch status with growing jittered waits under a ceiling
//! 3) terminal   - SUCCEEDED (decode text), ERRORED, or TIMED_OUT
//!
//! A transport or HTTP failure while polling ends the run immediately with
//! `RunPoll`; it is not treated as another RUNNING observation.

use std::time::Duration;

use async_trait::async_trait;
use inquiry_types::{PersonaRef, RunState};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backoff::PollBackoff;
use super::run_api::{RunApiError, RunInput, RunSnapshot, RunSubmission, SharedRunApi};
use super::{CompletionError, ManagedRunCompletion};

pub const DEFAULT_POLL_CEILING: Duration = Duration::from_secs(25);
pub const DEFAULT_POLL_BASE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Cumulative wall-clock budget from the start of polling.
    pub ceiling: Duration,
    /// Jitter unit of the backoff.
    pub base_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_POLL_CEILING,
            base_delay: DEFAULT_POLL_BASE_DELAY,
        }
    }
}

pub struct ManagedRunBackend {
    api: SharedRunApi,
    policy: PollPolicy,
}

impl ManagedRunBackend {
    pub fn new(api: SharedRunApi, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    fn submission(persona: &PersonaRef, query: &str) -> Result<RunSubmission, CompletionError> {
        let config: Value = serde_json::from_str(&persona.config)
            .map_err(|e| CompletionError::PersonaConfig(e.to_string()))?;
        Ok(RunSubmission {
            specification_hash: persona.specification_hash.clone(),
            config,
            blocking: false,
            inputs: vec![RunInput {
                question: query.to_string(),
            }],
        })
    }

    async fn poll_until_settled(
        &self,
        persona_id: &str,
        run_id: &str,
    ) -> Result<String, CompletionError> {
        let started = Instant::now();
        let mut backoff = PollBackoff::new(self.policy.base_delay);

        loop {
            let remaining = self.policy.ceiling.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(persona_id, run_id, waited_ms, "managed run timed out");
                return Err(CompletionError::RunTimeout {
                    run_id: run_id.to_string(),
                    waited_ms,
                });
            }

            tokio::time::sleep(backoff.next_delay().min(remaining)).await;

            let snapshot = self
                .api
                .fetch(persona_id, run_id)
                .await
                .map_err(|e| poll_error(run_id, e))?;

            match snapshot.status {
                RunState::Running => {
                    backoff.record_running();
                    debug!(
                        persona_id,
                        run_id,
                        observations = backoff.running_observations(),
                        "managed run still running"
                    );
                }
                RunState::Errored | RunState::Succeeded => {
                    return settle(snapshot);
                }
            }
        }
    }
}

#[async_trait]
impl ManagedRunCompletion for ManagedRunBackend {
    async fn complete(&self, persona: &PersonaRef, query: &str) -> Result<String, CompletionError> {
        let submission = Self::submission(persona, query)?;

        let handle = self
            .api
            .submit(&persona.id, &submission)
            .await
            .map_err(|e| CompletionError::Submission(e.to_string()))?;
        info!(
            persona_id = %persona.id,
            run_id = %handle.run_id,
            status = handle.status.as_str(),
            "submitted managed run"
        );

        match handle.status {
            RunState::Running => self.poll_until_settled(&persona.id, &handle.run_id).await,
            RunState::Errored | RunState::Succeeded => settle(handle),
        }
    }
}

fn settle(snapshot: RunSnapshot) -> Result<String, CompletionError> {
    match snapshot.status {
        RunState::Succeeded => {
            info!(run_id = %snapshot.run_id, "managed run succeeded");
            completion_text(&snapshot.results)
        }
        RunState::Errored => {
            warn!(run_id = %snapshot.run_id, "managed run errored");
            Err(CompletionError::RunFailed {
                run_id: snapshot.run_id,
            })
        }
        RunState::Running => Err(CompletionError::Decode(format!(
            "run {} is not terminal",
            snapshot.run_id
        ))),
    }
}

fn poll_error(run_id: &str, err: RunApiError) -> CompletionError {
    match err {
        RunApiError::Decode(message) => CompletionError::Decode(message),
        other => CompletionError::RunPoll {
            run_id: run_id.to_string(),
            message: other.to_string(),
        },
    }
}

/// Completion value of the first result entry; any other shape fails closed.
pub(crate) fn completion_text(results: &Value) -> Result<String, CompletionError> {
    results
        .get(0)
        .and_then(|block| block.get(0))
        .and_then(|entry| entry.get("value"))
        .and_then(|value| value.get("completion"))
        .and_then(|completion| completion.get("text"))
        .and_then(|text| text.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| {
            CompletionError::Decode("missing results[0][0].value.completion.text".to_string())
        })
}
