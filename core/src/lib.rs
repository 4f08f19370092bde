//! rollout-core: the execution engine behind `rollout`.
//!
//! A plan is a sequence of stages; each stage is a dependency graph of jobs
//! dispatched to named plugins wave by wave. See [`orchestrator::Orchestrator`]
//! for the entry point.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod plan;
pub mod plugin;
