//! Shared inquiry types
//!
//! These types are used by:
//! - the web API that creates inquiries and publishes `InquiryRequested`
//! - the completion worker that consumes the event and records the outcome
//!
//! Serializable with serde for JSON over the event bus and HTTP.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Inquiry lifecycle
// ============================================================================

/// Lifecycle state of an inquiry. `Requested` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InquiryStatus {
    Requested,
    Completed,
    Failed,
}

impl InquiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Requested)
    }
}

impl fmt::Display for InquiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InquiryStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUESTED" => Ok(Self::Requested),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(UnknownVariant {
                kind: "inquiry status",
                value: other.to_string(),
            }),
        }
    }
}

/// Channel the inquiry originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionType {
    Web,
    Telegram,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "WEB",
            Self::Telegram => "TELEGRAM",
        }
    }
}

impl FromStr for ConnectionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WEB" => Ok(Self::Web),
            "TELEGRAM" => Ok(Self::Telegram),
            other => Err(UnknownVariant {
                kind: "connection type",
                value: other.to_string(),
            }),
        }
    }
}

/// Returned when a stored string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// ============================================================================
// Requests
// ============================================================================

/// Reference to a persona workflow, pinned to one specification version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaRef {
    pub id: String,
    /// JSON-encoded workflow config; only the managed-run backend parses it.
    pub config: String,
    pub specification_hash: String,
}

/// Read-only input of one orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryRequest {
    pub id: String,
    pub query: String,
    pub query_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<PersonaRef>,
}

/// Detail payload of the `InquiryRequested` event published by the web API.
///
/// Persona `name`, `description` and `prompt` ride along on the bus but are
/// not needed to complete the inquiry, so they are ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryRequested {
    pub id: String,
    pub connection_type: ConnectionType,
    pub connection_user_id: String,
    pub query_type: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<PersonaRef>,
    #[serde(default = "requested")]
    pub status: InquiryStatus,
}

fn requested() -> InquiryStatus {
    InquiryStatus::Requested
}

impl InquiryRequested {
    pub fn to_request(&self) -> InquiryRequest {
        InquiryRequest {
            id: self.id.clone(),
            query: self.query.clone(),
            query_type: self.query_type.clone(),
            persona: self.persona.clone(),
        }
    }
}

/// Event-bus envelope delivered by the hosting trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub detail: T,
}

pub const INQUIRY_REQUESTED_DETAIL_TYPE: &str = "InquiryRequested";

// ============================================================================
// Stored record
// ============================================================================

/// Full inquiry record as returned by the store after an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inquiry {
    pub id: String,
    pub connection_type: ConnectionType,
    pub connection_user_id: String,
    pub query_type: String,
    pub query: String,
    pub status: InquiryStatus,
    #[serde(default)]
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied to an inquiry. Absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InquiryUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<InquiryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl InquiryUpdate {
    pub fn completed(result: impl Into<String>) -> Self {
        Self {
            status: Some(InquiryStatus::Completed),
            result: Some(result.into()),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: Some(InquiryStatus::Failed),
            result: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(|s| s.is_terminal())
    }
}

// ============================================================================
// Managed runs
// ============================================================================

/// Status of a managed workflow run as reported by the workflow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Succeeded,
    Errored,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Errored => "errored",
        }
    }
}
