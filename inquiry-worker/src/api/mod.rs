//! Event receiver: the HTTP surface the hosting trigger delivers inquiry
//! events to.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use inquiry_types::{EventEnvelope, InquiryRequested, INQUIRY_REQUESTED_DETAIL_TYPE};
use serde_json::json;
use tracing::{error, info, warn};

use crate::orchestrator::OrchestrationError;
use crate::store::StatusUpdateError;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/events/inquiry-requested", post(inquiry_requested))
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// POST /events/inquiry-requested
///
/// Runs one orchestration to its terminal status. An inquiry that is already
/// settled answers its stored record without running again.
pub async fn inquiry_requested(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<EventEnvelope<InquiryRequested>>,
) -> impl IntoResponse {
    if envelope.detail_type != INQUIRY_REQUESTED_DETAIL_TYPE {
        warn!(detail_type = %envelope.detail_type, "rejecting unexpected event");
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "code": "UNSUPPORTED_EVENT",
                "message": format!("unsupported detail-type '{}'", envelope.detail_type),
            })),
        )
            .into_response();
    }

    let event = envelope.detail;
    info!(
        inquiry_id = %event.id,
        source = envelope.source.as_deref().unwrap_or("unknown"),
        connection_type = event.connection_type.as_str(),
        "inquiry event received"
    );

    match state.store.ensure_recorded(&event).await {
        Ok(Some(record)) if record.status.is_terminal() => {
            info!(
                inquiry_id = %event.id,
                status = %record.status,
                "inquiry already settled, skipping redelivered event"
            );
            return Json(json!({ "data": record })).into_response();
        }
        Ok(_) => {}
        Err(e) => {
            error!(inquiry_id = %event.id, error = %e, "could not record inbound inquiry");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "code": e.code(), "message": e.to_string() })),
            )
                .into_response();
        }
    }

    match state.orchestrator.orchestrate(&event.to_request()).await {
        Ok(result) => Json(json!({ "data": result.record })).into_response(),
        Err(e) => (
            failure_status(&e),
            Json(json!({ "code": e.code(), "message": e.to_string() })),
        )
            .into_response(),
    }
}

/// 409 when another orchestration already settled the inquiry, so the
/// trigger stops redelivering; 502 for everything else.
fn failure_status(err: &OrchestrationError) -> StatusCode {
    match err {
        OrchestrationError::StatusUpdate(StatusUpdateError::AlreadyTerminal { .. }) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::BAD_GATEWAY,
    }
}
