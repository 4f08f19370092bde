use async_trait::async_trait;
use rollout_core::api::{ApprovalGate, ExecutionContext, Stage};

/// Answers every approval request the same way. Used for CI and `auto_*`
/// approval modes.
#[derive(Debug, Clone, Copy)]
pub struct StaticApprovalGate {
    approve: bool,
}

impl StaticApprovalGate {
    pub fn approve() -> Self {
        Self { approve: true }
    }

    pub fn reject() -> Self {
        Self { approve: false }
    }
}

#[async_trait]
impl ApprovalGate for StaticApprovalGate {
    async fn request_approval(&self, ctx: &ExecutionContext, stage: &Stage) -> anyhow::Result<bool> {
        tracing::info!(
            execution_id = ctx.execution_id(),
            stage = %stage.name,
            approved = self.approve,
            "approval answered automatically"
        );
        Ok(self.approve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_answers() {
        let ctx = ExecutionContext::detached("exec");
        let stage = Stage::new("prod", vec![]);
        assert!(StaticApprovalGate::approve()
            .request_approval(&ctx, &stage)
            .await
            .unwrap());
        assert!(!StaticApprovalGate::reject()
            .request_approval(&ctx, &stage)
            .await
            .unwrap());
    }
}
