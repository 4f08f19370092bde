//! Wave-based execution of a single stage's job graph.
//!
//! # Architecture
//!
//! ```text
//! Stage.jobs
//!   ↓
//! JobGraph::from_jobs()
//!   ↓
//! JobGraph { jobs, dependencies, dependents, completed }
//!   ↓
//! Executor::execute_graph()
//!   ├─ find_cycle() → reject before dispatch
//!   └─ loop: get_ready_jobs() → execute_wave() → mark_completed()
//!   ↓
//! StageResult.jobs
//! ```

mod engine;
mod graph;
mod scheduler;
pub mod traits;
mod types;

pub use engine::{Executor, DRY_RUN_MESSAGE};
pub use graph::JobGraph;
pub use scheduler::execute_wave;
pub use traits::{OutputRendererPlugin, RenderEvent};
pub use types::{ExecutorOptions, DEFAULT_DRY_RUN_DELAY};
