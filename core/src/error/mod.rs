#[allow(clippy::module_inception)]
pub mod error;
pub mod code;
pub mod executor;
pub mod plan;
pub mod plugin;

pub use code::ErrorCode;
pub use error::{CliError, ExecutionFailure, RunError};
pub use executor::ExecutorError;
pub use plan::{PlanError, ResolveError};
pub use plugin::PluginError;
