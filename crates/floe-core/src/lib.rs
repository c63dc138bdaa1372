//! floe-core: Shared runtime components for the floe change-stream watcher.
//!
//! This crate contains the pieces that do not depend on the change-stream
//! record model:
//!
//! - `config/` - YAML loading from files and directories, environment variable
//!   interpolation, component keys and global options
//! - `metrics/` - Prometheus metrics infrastructure and internal events
//! - `topology/` - Task outcomes, the fate-sharing task group and the runner
//!   that drives several independent pipelines in one process
//! - `retry` - Backoff policy for opening partition queries
//! - `signal` - Signal handling for graceful shutdown
//! - `error` - Common error types
//! - `app` - Application abstraction for reducing main.rs boilerplate

pub mod app;
pub mod config;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod signal;
pub mod topology;
pub mod tracing;

// Re-export commonly used items
pub use app::{AppConfig, Application};
pub use config::{CliArgs, ComponentKey, GlobalConfig, MetricsConfig, Resource};
pub use error::{ConfigError, MetricsError, PipelineSetupError};
pub use metrics::{
    DEFAULT_METRICS_ADDR, MetricsController, init_global as init_metrics,
    init_test as init_metrics_test,
};
pub use retry::{RetryConfig, random_jitter};
pub use signal::shutdown_signal;
pub use topology::{
    GroupState, GroupSummary, Pipeline, PipelineContext, PipelineRunner, RunReport, Task,
    TaskError, TaskGroup, TaskOutput, TaskResult, run_pipelines,
};
pub use tracing::init_tracing;
