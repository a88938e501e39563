use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inquiry_types::{Inquiry, InquiryRequested, InquiryStatus, InquiryUpdate};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use super::{InquiryStore, StatusUpdateError};

/// SQLite-backed inquiry store.
///
/// Terminal writes are conditional: a COMPLETED or FAILED status is applied
/// only while the row is still REQUESTED, so a duplicate orchestration of the
/// same inquiry cannot overwrite the first outcome.
#[derive(Debug, Clone)]
pub struct SqliteInquiryStore {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct InquiryRow {
    id: String,
    connection_type: String,
    connection_user_id: String,
    query_type: String,
    query: String,
    status: String,
    result: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InquiryRow> for Inquiry {
    type Error = StatusUpdateError;

    fn try_from(row: InquiryRow) -> Result<Self, Self::Error> {
        Ok(Inquiry {
            connection_type: row
                .connection_type
                .parse()
                .map_err(|e| StatusUpdateError::Decode(format!("{e}")))?,
            status: row
                .status
                .parse()
                .map_err(|e| StatusUpdateError::Decode(format!("{e}")))?,
            id: row.id,
            connection_user_id: row.connection_user_id,
            query_type: row.query_type,
            query: row.query,
            result: row.result,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const UPDATE_ANY: &str = "UPDATE inquiries
     SET status = COALESCE(?, status), result = COALESCE(?, result), updated_at = ?
     WHERE id = ?";

const UPDATE_FROM_REQUESTED: &str = "UPDATE inquiries
     SET status = COALESCE(?, status), result = COALESCE(?, result), updated_at = ?
     WHERE id = ? AND status = 'REQUESTED'";

const INSERT_REQUESTED: &str = "INSERT INTO inquiries
     (id, connection_type, connection_user_id, query_type, query, status, result, created_at, updated_at)
     VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)";

const INSERT_REQUESTED_IF_NEW: &str = "INSERT INTO inquiries
     (id, connection_type, connection_user_id, query_type, query, status, result, created_at, updated_at)
     VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)
     ON CONFLICT(id) DO NOTHING";

impl SqliteInquiryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a REQUESTED row for a freshly published inquiry. The status
    /// carried by the event is ignored; a new row always starts REQUESTED.
    pub async fn create(&self, event: &InquiryRequested) -> Result<Inquiry, StatusUpdateError> {
        self.insert(event, INSERT_REQUESTED).await?;
        self.get(&event.id)
            .await?
            .ok_or_else(|| StatusUpdateError::NotFound(event.id.clone()))
    }

    async fn insert(&self, event: &InquiryRequested, sql: &str) -> Result<u64, StatusUpdateError> {
        let now = Utc::now();
        let rows = sqlx::query(sql)
            .bind(&event.id)
            .bind(event.connection_type.as_str())
            .bind(&event.connection_user_id)
            .bind(&event.query_type)
            .bind(&event.query)
            .bind(InquiryStatus::Requested.as_str())
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Inquiry>, StatusUpdateError> {
        let row: Option<InquiryRow> = sqlx::query_as(
            "SELECT id, connection_type, connection_user_id, query_type, query, status, result, created_at, updated_at
             FROM inquiries WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Inquiry::try_from).transpose()
    }
}

#[async_trait]
impl InquiryStore for SqliteInquiryStore {
    async fn update(&self, id: &str, update: InquiryUpdate) -> Result<Inquiry, StatusUpdateError> {
        if update.status.is_none() && update.result.is_none() {
            return self
                .get(id)
                .await?
                .ok_or_else(|| StatusUpdateError::NotFound(id.to_string()));
        }

        let sql = if update.is_terminal() {
            UPDATE_FROM_REQUESTED
        } else {
            UPDATE_ANY
        };
        let rows = sqlx::query(sql)
            .bind(update.status.map(|s| s.as_str()))
            .bind(update.result.as_deref())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return match self.get(id).await? {
                None => Err(StatusUpdateError::NotFound(id.to_string())),
                Some(existing) => {
                    warn!(
                        inquiry_id = id,
                        status = %existing.status,
                        "refusing second terminal write"
                    );
                    Err(StatusUpdateError::AlreadyTerminal {
                        id: id.to_string(),
                        status: existing.status,
                    })
                }
            };
        }

        debug!(inquiry_id = id, "inquiry row updated");
        self.get(id)
            .await?
            .ok_or_else(|| StatusUpdateError::NotFound(id.to_string()))
    }

    async fn ensure_recorded(
        &self,
        event: &InquiryRequested,
    ) -> Result<Option<Inquiry>, StatusUpdateError> {
        if self.insert(event, INSERT_REQUESTED_IF_NEW).await? > 0 {
            debug!(inquiry_id = %event.id, "recorded inbound inquiry");
        }
        self.get(&event.id).await
    }
}

#[cfg(test)]
mod tests {
    use inquiry_types::{ConnectionType, InquiryStatus};

    use super::*;
    use crate::db;

    async fn store() -> SqliteInquiryStore {
        SqliteInquiryStore::new(db::connect_in_memory().await.unwrap())
    }

    fn requested(id: &str) -> InquiryRequested {
        InquiryRequested {
            id: id.to_string(),
            connection_type: ConnectionType::Telegram,
            connection_user_id: "u-1".to_string(),
            query_type: "chat".to_string(),
            query: "hello".to_string(),
            persona: None,
            status: InquiryStatus::Requested,
        }
    }

    #[tokio::test]
    async fn create_then_complete() {
        let store = store().await;
        let created = store.create(&requested("abc123")).await.unwrap();
        assert_eq!(created.status, InquiryStatus::Requested);
        assert_eq!(created.result, None);

        let updated = store
            .update("abc123", InquiryUpdate::completed("hi there"))
            .await
            .unwrap();

        assert_eq!(updated.status, InquiryStatus::Completed);
        assert_eq!(updated.result.as_deref(), Some("hi there"));
        assert_eq!(updated.connection_type, ConnectionType::Telegram);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn failed_write_leaves_result_empty() {
        let store = store().await;
        store.create(&requested("f1")).await.unwrap();

        let updated = store.update("f1", InquiryUpdate::failed()).await.unwrap();

        assert_eq!(updated.status, InquiryStatus::Failed);
        assert_eq!(updated.result, None);
    }

    #[tokio::test]
    async fn second_terminal_write_is_rejected() {
        let store = store().await;
        store.create(&requested("dup")).await.unwrap();
        store
            .update("dup", InquiryUpdate::completed("first"))
            .await
            .unwrap();

        let err = store
            .update("dup", InquiryUpdate::failed())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StatusUpdateError::AlreadyTerminal { status: InquiryStatus::Completed, .. }
        ));
        let row = store.get("dup").await.unwrap().unwrap();
        assert_eq!(row.result.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn unknown_inquiry_is_not_found() {
        let store = store().await;
        let err = store
            .update("missing", InquiryUpdate::failed())
            .await
            .unwrap_err();
        assert!(matches!(err, StatusUpdateError::NotFound(ref id) if id == "missing"));
    }

    #[tokio::test]
    async fn ensure_recorded_keeps_existing_row() {
        let store = store().await;
        let fresh = store.ensure_recorded(&requested("r1")).await.unwrap().unwrap();
        assert_eq!(fresh.status, InquiryStatus::Requested);
        store
            .update("r1", InquiryUpdate::completed("done"))
            .await
            .unwrap();

        let existing = store.ensure_recorded(&requested("r1")).await.unwrap().unwrap();

        assert_eq!(existing.status, InquiryStatus::Completed);
        assert_eq!(existing.result.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn new_rows_start_requested_whatever_the_event_says() {
        let store = store().await;
        let mut stale = requested("s1");
        stale.status = InquiryStatus::Completed;

        let recorded = store.ensure_recorded(&stale).await.unwrap().unwrap();
        assert_eq!(recorded.status, InquiryStatus::Requested);

        let mut created_stale = requested("s2");
        created_stale.status = InquiryStatus::Failed;
        let created = store.create(&created_stale).await.unwrap();
        assert_eq!(created.status, InquiryStatus::Requested);
    }

    #[tokio::test]
    async fn empty_update_returns_current_record() {
        let store = store().await;
        store.create(&requested("e1")).await.unwrap();

        let record = store.update("e1", InquiryUpdate::default()).await.unwrap();

        assert_eq!(record.status, InquiryStatus::Requested);
    }
}
