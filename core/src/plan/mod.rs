//! Plan ingestion: YAML loading, structural validation and `${...}` resolution.

pub mod loader;
pub mod resolver;
pub mod validator;

pub use loader::PlanLoader;
pub use resolver::VariableResolver;
pub use validator::PlanValidator;
