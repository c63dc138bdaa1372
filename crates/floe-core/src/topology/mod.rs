//! Task execution and pipeline orchestration.
//!
//! - `task`: task wrapper and outcome types
//! - `group`: fate-sharing group of dynamically submitted tasks
//! - `pipeline`: runner for several independent pipelines in one process

mod group;
mod pipeline;
mod task;

pub use group::{GroupState, GroupSummary, TaskGroup};
pub use pipeline::{Pipeline, PipelineContext, PipelineRunner, RunReport, run_pipelines};
pub use task::{BoxFuture, Task, TaskError, TaskOutput, TaskResult};
