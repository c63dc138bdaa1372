//! Task wrapper and task outcome types.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// A boxed future that produces a TaskResult.
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = TaskResult> + Send + 'a>>;

/// Result type for task execution.
pub type TaskResult = Result<TaskOutput, TaskError>;

/// Successful output from a task.
#[derive(Debug, Default)]
pub struct TaskOutput {
    /// Optional summary of what the task accomplished, logged on completion.
    pub message: Option<String>,
}

impl TaskOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

/// Why a task did not succeed.
#[derive(Debug)]
pub enum TaskError {
    /// The task observed cancellation and stopped early.
    Cancelled,
    /// The task panicked.
    Panicked(String),
    /// The task failed with an error.
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "task cancelled"),
            Self::Panicked(msg) => write!(f, "task panicked: {}", msg),
            Self::Failed(err) => write!(f, "task failed: {}", err),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl TaskError {
    /// Create a Failed error from any error type.
    pub fn failed<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed(Box::new(err))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_panicked(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    /// The concrete error behind a `Failed` outcome, if it has type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Failed(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// A named unit of work submitted to a [`TaskGroup`](super::TaskGroup).
///
/// `K` identifies the work in logs (a partition token, a stream key).
pub struct Task<K> {
    pub key: K,
    pub future: BoxFuture<'static>,
    /// A type tag for logging (e.g., "partition").
    pub typetag: &'static str,
}

impl<K> Task<K> {
    pub fn new<F>(key: K, typetag: &'static str, future: F) -> Self
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            key,
            future: Box::pin(future),
            typetag,
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for Task<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("key", &self.key)
            .field("typetag", &self.typetag)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn test_task_output() {
        assert!(TaskOutput::empty().message.is_none());
        assert_eq!(
            TaskOutput::with_message("12 records").message.as_deref(),
            Some("12 records")
        );
    }

    #[test]
    fn test_task_error_display() {
        assert_eq!(TaskError::Cancelled.to_string(), "task cancelled");
        assert_eq!(
            TaskError::Panicked("oops".to_string()).to_string(),
            "task panicked: oops"
        );
        assert_eq!(TaskError::failed(Boom).to_string(), "task failed: boom");
    }

    #[test]
    fn test_task_error_predicates() {
        assert!(TaskError::Cancelled.is_cancelled());
        assert!(!TaskError::Cancelled.is_panicked());
        assert!(TaskError::Panicked("x".to_string()).is_panicked());
    }

    #[test]
    fn test_downcast() {
        let err = TaskError::failed(Boom);
        assert!(err.downcast_ref::<Boom>().is_some());
        assert!(err.downcast_ref::<std::io::Error>().is_none());
        assert!(TaskError::Cancelled.downcast_ref::<Boom>().is_none());
    }

    #[test]
    fn test_task_debug() {
        let task = Task::new("part-a", "partition", async { Ok(TaskOutput::empty()) });
        let debug = format!("{:?}", task);
        assert!(debug.contains("part-a"));
        assert!(debug.contains("partition"));
    }
}
