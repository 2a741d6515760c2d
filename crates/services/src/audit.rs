//! Audit trail dispatch.

use std::sync::Arc;

use domains::ports::AuditRepo;
use tracing::warn;

/// Action labels written to the audit log.
pub mod actions {
    pub const LOGON: &str = "LOGON";
    pub const LOGOUT: &str = "LOGOUT";
    pub const IMAGE_UPLOAD: &str = "IMAGE-UPLOAD";
    pub const IMAGE_SCORE: &str = "IMAGE-SCORE";
    pub const IMAGE_SOURCE: &str = "IMAGE-SOURCE";
    pub const IMAGE_NAME: &str = "IMAGE-NAME";
    pub const ADD_IMAGETAG: &str = "ADD-IMAGETAG";
    pub const REMOVE_IMAGETAG: &str = "REMOVE-IMAGETAG";
    pub const ADD_IMAGERATING: &str = "ADD-IMAGERATING";
    pub const CREATE_TAG: &str = "CREATE-TAG";
}

/// Records user actions. A failed write is logged and swallowed so a
/// broken audit table can never block the action being recorded.
#[derive(Clone)]
pub struct AuditTrail {
    repo: Arc<dyn AuditRepo>,
}

impl AuditTrail {
    pub fn new(repo: Arc<dyn AuditRepo>) -> Self {
        Self { repo }
    }

    pub async fn record(&self, user_id: u64, action: &str, details: &str) {
        if let Err(err) = self.repo.record(user_id, action, details).await {
            warn!(action, error = %err, "audit write failed");
        }
    }
}
