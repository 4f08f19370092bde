use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::model::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// A pending decision on whether a stage may run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub execution_id: String,
    pub stage_name: String,
    pub approvers: Vec<String>,
    pub status: ApprovalStatus,
    pub requested_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub responder: Option<String>,
    pub comment: Option<String>,
}

impl ApprovalRequest {
    pub fn new(ctx: &ExecutionContext, stage: &Stage, ttl: Option<Duration>) -> Self {
        let requested_at = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            execution_id: ctx.execution_id().to_string(),
            stage_name: stage.name.clone(),
            approvers: stage.approvers.clone(),
            status: ApprovalStatus::Pending,
            requested_at,
            expires_at: ttl.map(|d| requested_at + d),
            responded_at: None,
            responder: None,
            comment: None,
        }
    }

    /// Apply a response; a response after expiry marks the request expired.
    pub fn apply(&mut self, response: &ApprovalResponse) {
        if self.is_expired_at(response.responded_at) {
            self.status = ApprovalStatus::Expired;
            return;
        }
        self.status = if response.approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        self.responded_at = Some(response.responded_at);
        self.responder = response.responder.clone();
        self.comment = response.comment.clone();
    }

    pub fn expire(&mut self) {
        self.status = ApprovalStatus::Expired;
    }

    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| at > exp).unwrap_or(false)
    }

    pub fn is_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub request_id: String,
    pub approved: bool,
    pub responder: Option<String>,
    pub comment: Option<String>,
    pub responded_at: DateTime<Utc>,
}

impl ApprovalResponse {
    pub fn new(request: &ApprovalRequest, approved: bool) -> Self {
        Self {
            request_id: request.id.clone(),
            approved,
            responder: None,
            comment: None,
            responded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_response_sets_status() {
        let ctx = ExecutionContext::detached("exec-1");
        let stage = Stage::new("prod", vec![]).with_approval(vec!["ops".into()]);
        let mut request = ApprovalRequest::new(&ctx, &stage, None);
        assert_eq!(request.status, ApprovalStatus::Pending);
        assert_eq!(request.execution_id, "exec-1");

        let response = ApprovalResponse::new(&request, true);
        request.apply(&response);
        assert!(request.is_approved());
    }

    #[test]
    fn test_late_response_expires_request() {
        let ctx = ExecutionContext::detached("exec-1");
        let stage = Stage::new("prod", vec![]);
        let mut request = ApprovalRequest::new(&ctx, &stage, Some(Duration::seconds(1)));

        let mut response = ApprovalResponse::new(&request, true);
        response.responded_at = request.requested_at + Duration::seconds(5);
        request.apply(&response);
        assert_eq!(request.status, ApprovalStatus::Expired);
    }
}
