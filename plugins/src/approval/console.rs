use std::time::Duration;

use async_trait::async_trait;
use rollout_core::api::{
    ApprovalGate, ApprovalRequest, ApprovalResponse, ExecutionContext, Stage,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Asks for a y/N answer on the terminal.
///
/// The prompt goes to stderr so JSONL output on stdout stays clean. With a
/// timeout, an unanswered request expires and counts as a rejection.
#[derive(Debug, Clone, Default)]
pub struct ConsoleApprovalGate {
    timeout: Option<Duration>,
}

impl ConsoleApprovalGate {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    async fn decide<R>(
        &self,
        ctx: &ExecutionContext,
        stage: &Stage,
        reader: &mut R,
    ) -> anyhow::Result<ApprovalRequest>
    where
        R: AsyncBufRead + Unpin,
    {
        let ttl = self.timeout.map(chrono::Duration::from_std).transpose()?;
        let mut request = ApprovalRequest::new(ctx, stage, ttl);

        eprintln!("{}", prompt_text(&request));

        match read_answer(reader, ctx.cancellation_token(), self.timeout).await? {
            Some(line) => {
                let mut response = ApprovalResponse::new(&request, is_yes(&line));
                response.responder = std::env::var("USER").ok();
                request.apply(&response);
            }
            None => {
                eprintln!("approval request for stage {} expired", stage.name);
                request.expire();
            }
        }

        tracing::info!(
            stage = %stage.name,
            request_id = %request.id,
            status = ?request.status,
            "approval decided"
        );
        Ok(request)
    }
}

fn prompt_text(request: &ApprovalRequest) -> String {
    let mut text = format!(
        "Stage '{}' requires approval (execution {})",
        request.stage_name, request.execution_id
    );
    if !request.approvers.is_empty() {
        text.push_str(&format!("\n  approvers: {}", request.approvers.join(", ")));
    }
    if let Some(expires) = request.expires_at {
        text.push_str(&format!("\n  expires:   {}", expires.to_rfc3339()));
    }
    text.push_str("\nApprove? [y/N] ");
    text
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// One line from `reader`; `None` when the timeout elapses first.
async fn read_answer<R>(
    reader: &mut R,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) -> anyhow::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    let mut line = String::new();
    tokio::select! {
        read = reader.read_line(&mut line) => {
            read?;
            Ok(Some(line))
        }
        _ = cancel.cancelled() => anyhow::bail!("approval cancelled"),
        _ = deadline => Ok(None),
    }
}

#[async_trait]
impl ApprovalGate for ConsoleApprovalGate {
    async fn request_approval(&self, ctx: &ExecutionContext, stage: &Stage) -> anyhow::Result<bool> {
        let mut stdin = BufReader::new(tokio::io::stdin());
        let request = self.decide(ctx, stage, &mut stdin).await?;
        Ok(request.is_approved())
    }
}
