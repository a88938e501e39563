use async_trait::async_trait;
use inquiry_types::{Inquiry, InquiryUpdate};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, error};

use super::{InquiryStore, StatusUpdateError};

/// Inquiry store backed by the web API's `PATCH /api/v1/inquiries/{id}`.
#[derive(Debug, Clone)]
pub struct HttpInquiryStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SuccessRes<T> {
    data: T,
}

impl HttpInquiryStore {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn inquiry_url(&self, id: &str) -> String {
        format!(
            "{}/api/v1/inquiries/{}",
            self.base_url.trim_end_matches('/'),
            id
        )
    }
}

#[async_trait]
impl InquiryStore for HttpInquiryStore {
    async fn update(&self, id: &str, update: InquiryUpdate) -> Result<Inquiry, StatusUpdateError> {
        let response = self
            .http
            .patch(self.inquiry_url(id))
            .header("x-api-key", &self.api_key)
            .json(&update)
            .send()
            .await
            .map_err(|e| StatusUpdateError::Backend(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StatusUpdateError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(inquiry_id = id, %status, "inquiry API rejected update");
            return Err(StatusUpdateError::Backend(format!(
                "status {}: {}",
                status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StatusUpdateError::Backend(e.to_string()))?;
        let payload: SuccessRes<Inquiry> =
            serde_json::from_slice(&bytes).map_err(|e| StatusUpdateError::Decode(e.to_string()))?;
        debug!(inquiry_id = id, status = %payload.data.status, "inquiry API accepted update");
        Ok(payload.data)
    }
}
