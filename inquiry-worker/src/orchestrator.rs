//! One inquiry, start to terminal status.
//!
//! `orchestrate` selects a strategy, runs it, and writes exactly one terminal
//! status through the [`InquiryStore`](crate::store::InquiryStore). A
//! completion failure is recorded as FAILED and then returned unchanged so the
//! trigger's redelivery policy decides what happens next.

use inquiry_types::{Inquiry, InquiryRequest, InquiryUpdate};
use tracing::{error, info, warn};

use crate::completion::{
    select_strategy, CompletionError, CompletionStrategy, SharedDirectCompletion,
    SharedManagedRunCompletion,
};
use crate::store::{SharedInquiryStore, StatusUpdateError};

#[derive(Debug, Clone, PartialEq)]
pub struct InquiryResult {
    pub completion_text: String,
    /// Record as returned by the status store after the COMPLETED write.
    pub record: Inquiry,
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum OrchestrationError {
    /// The backend failed and FAILED was recorded.
    #[error(transparent)]
    Completion(CompletionError),
    /// The backend succeeded but the COMPLETED write did not.
    #[error("recording completion failed: {0}")]
    StatusUpdate(StatusUpdateError),
    /// The backend failed and the FAILED write failed too.
    #[error("{completion}; recording failure also failed: {status}")]
    FailureNotRecorded {
        completion: CompletionError,
        status: StatusUpdateError,
    },
}

impl OrchestrationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Completion(e) => e.code(),
            Self::StatusUpdate(e) => e.code(),
            Self::FailureNotRecorded { status, .. } => status.code(),
        }
    }

    /// The backend error behind this failure, if the backend failed.
    pub fn completion_error(&self) -> Option<&CompletionError> {
        match self {
            Self::Completion(e) | Self::FailureNotRecorded { completion: e, .. } => Some(e),
            Self::StatusUpdate(_) => None,
        }
    }
}

pub struct InquiryOrchestrator {
    direct: SharedDirectCompletion,
    managed: SharedManagedRunCompletion,
    store: SharedInquiryStore,
}

impl InquiryOrchestrator {
    pub fn new(
        direct: SharedDirectCompletion,
        managed: SharedManagedRunCompletion,
        store: SharedInquiryStore,
    ) -> Self {
        Self {
            direct,
            managed,
            store,
        }
    }

    pub async fn orchestrate(
        &self,
        request: &InquiryRequest,
    ) -> Result<InquiryResult, OrchestrationError> {
        let strategy = select_strategy(request);
        info!(
            inquiry_id = %request.id,
            strategy = strategy.as_str(),
            query_type = %request.query_type,
            "orchestrating inquiry"
        );

        let outcome = match strategy {
            CompletionStrategy::Direct { query } => self.direct.complete(query).await,
            CompletionStrategy::ManagedRun { persona, query } => {
                self.managed.complete(persona, query).await
            }
        };

        match outcome {
            Ok(text) => {
                let record = self
                    .store
                    .update(&request.id, InquiryUpdate::completed(text.clone()))
                    .await
                    .map_err(|e| {
                        error!(inquiry_id = %request.id, error = %e, "failed to record completion");
                        OrchestrationError::StatusUpdate(e)
                    })?;
                info!(
                    inquiry_id = %request.id,
                    strategy = strategy.as_str(),
                    bytes = text.len(),
                    "inquiry completed"
                );
                Ok(InquiryResult {
                    completion_text: text,
                    record,
                })
            }
            Err(completion) => {
                warn!(
                    inquiry_id = %request.id,
                    strategy = strategy.as_str(),
                    code = completion.code(),
                    error = %completion,
                    "inquiry failed"
                );
                match self.store.update(&request.id, InquiryUpdate::failed()).await {
                    Ok(_) => Err(OrchestrationError::Completion(completion)),
                    Err(status) => {
                        error!(inquiry_id = %request.id, error = %status, "failed to record failure");
                        Err(OrchestrationError::FailureNotRecorded { completion, status })
                    }
                }
            }
        }
    }
}
