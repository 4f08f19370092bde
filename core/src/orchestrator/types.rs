/// Per-run switches for [`Orchestrator::execute_plan`](super::Orchestrator::execute_plan).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Run the rollback plan (or handler rollbacks) when a stage fails
    pub auto_rollback: bool,

    /// Treat every approval-gated stage as approved
    pub skip_approval: bool,

    /// Simulate jobs instead of calling plugins
    pub dry_run: bool,
}
