use std::sync::Arc;

use crate::orchestrator::InquiryOrchestrator;
use crate::store::SharedInquiryStore;

pub struct AppState {
    pub orchestrator: Arc<InquiryOrchestrator>,
    pub store: SharedInquiryStore,
}
