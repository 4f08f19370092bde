pub mod approval;
pub mod plan;
pub mod result;

pub use approval::{ApprovalRequest, ApprovalResponse, ApprovalStatus};
pub use plan::{Include, Job, JobConfig, Metadata, Plan, Rollback, Stage};
pub use result::{ExecutionResult, JobResult, StageResult, StageStatus};
