//! Inquiry status persistence.
//!
//! The orchestrator only ever sees [`InquiryStore`]; whether the record lives
//! in the worker's own SQLite database or behind the web API is decided at
//! startup.

pub mod http;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use inquiry_types::{Inquiry, InquiryRequested, InquiryStatus, InquiryUpdate};

pub use http::HttpInquiryStore;
pub use sqlite::SqliteInquiryStore;

pub type SharedInquiryStore = Arc<dyn InquiryStore>;

#[async_trait]
pub trait InquiryStore: Send + Sync {
    /// Apply `update` to inquiry `id` and return the full updated record.
    async fn update(&self, id: &str, update: InquiryUpdate) -> Result<Inquiry, StatusUpdateError>;

    /// Make sure a REQUESTED record exists for an inbound event and return the
    /// current record when the store can read it. Stores whose records are
    /// created upstream keep the default, which returns `None`.
    async fn ensure_recorded(
        &self,
        _event: &InquiryRequested,
    ) -> Result<Option<Inquiry>, StatusUpdateError> {
        Ok(None)
    }
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum StatusUpdateError {
    #[error("inquiry not found: {0}")]
    NotFound(String),
    /// A terminal status was already recorded for this inquiry.
    #[error("inquiry {id} already {status}")]
    AlreadyTerminal { id: String, status: InquiryStatus },
    #[error("status store error: {0}")]
    Backend(String),
    #[error("status store returned an undecodable record: {0}")]
    Decode(String),
}

impl StatusUpdateError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "INQUIRY_NOT_FOUND",
            Self::AlreadyTerminal { .. } => "INQUIRY_ALREADY_TERMINAL",
            Self::Backend(_) => "STATUS_STORE",
            Self::Decode(_) => "STATUS_STORE_DECODE",
        }
    }
}

impl From<sqlx::Error> for StatusUpdateError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
