use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::model::Stage;

/// Decides whether a stage marked `requireApproval` may run.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    /// `Ok(true)` approves, `Ok(false)` rejects. An error fails the run.
    async fn request_approval(&self, ctx: &ExecutionContext, stage: &Stage)
        -> anyhow::Result<bool>;
}
