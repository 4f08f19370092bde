//! Runs a plan's stages in order with approval gating and rollback.

mod rollback;
mod run;
mod traits;
mod types;

pub use run::Orchestrator;
pub use traits::ApprovalGate;
pub use types::ExecuteOptions;
