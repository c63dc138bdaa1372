//! Fate-sharing group of dynamically submitted tasks.
//!
//! A [`TaskGroup`] tracks every task submitted to it, including tasks that
//! running members submit while the group is already being awaited. The
//! first task to fail (or panic) cancels the group's token, which every
//! member is expected to observe cooperatively, and becomes the error
//! returned by [`TaskGroup::wait`].
//!
//! Membership is not known up front, so there is no fixed-size pool: the
//! group is a task tracker, a cancellation token and a first-error slot.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

use super::task::{Task, TaskError, TaskResult};

/// Lifecycle of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Accepting submissions; nobody is waiting yet.
    Open,
    /// `wait()` was called; members may still submit new tasks.
    Draining,
    /// Every task finished; further submissions are rejected.
    Closed,
}

impl GroupState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => GroupState::Open,
            1 => GroupState::Draining,
            _ => GroupState::Closed,
        }
    }
}

/// Task counts at the moment the group closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupSummary {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Submissions refused because the group was cancelled or closed.
    pub rejected: u64,
}

struct GroupInner {
    name: String,
    tracker: TaskTracker,
    cancel: CancellationToken,
    first_error: Mutex<Option<TaskError>>,
    state: AtomicU8,
    active: AtomicUsize,
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    rejected: AtomicU64,
}

/// Handle to a task group. Cloning shares the same group.
#[derive(Clone)]
pub struct TaskGroup {
    inner: Arc<GroupInner>,
}

impl fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGroup")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("active", &self.active())
            .finish_non_exhaustive()
    }
}

impl TaskGroup {
    /// Create a group whose members observe `cancel`.
    ///
    /// Pass a child of a process-wide token so an external shutdown reaches
    /// the group while a failure inside the group stays local to it.
    pub fn new(name: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                name: name.into(),
                tracker: TaskTracker::new(),
                cancel,
                first_error: Mutex::new(None),
                state: AtomicU8::new(0),
                active: AtomicUsize::new(0),
                submitted: AtomicU64::new(0),
                succeeded: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                cancelled: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
            }),
        }
    }

    /// The group's shared cancellation signal.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub fn state(&self) -> GroupState {
        GroupState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Number of submitted tasks that have not finished yet.
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Start `task` concurrently with the other members.
    ///
    /// Safe to call from inside a running member. Returns `false` (and never
    /// runs the task) if the group is cancelled or already closed.
    pub fn submit<K: fmt::Display>(&self, task: Task<K>) -> bool {
        let Task {
            key,
            future,
            typetag,
        } = task;

        if self.is_cancelled() || self.state() == GroupState::Closed {
            self.inner.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(group = %self.inner.name, key = %key, "Rejected {} submission", typetag);
            return false;
        }

        self.inner.submitted.fetch_add(1, Ordering::Relaxed);
        self.inner.active.fetch_add(1, Ordering::AcqRel);

        let inner = Arc::clone(&self.inner);
        let label = key.to_string();
        self.inner.tracker.spawn(async move {
            let result = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(TaskError::Panicked(panic_message(panic.as_ref()))),
            };
            inner.finish(&label, typetag, result);
        });
        true
    }

    /// Wait until every submitted task, including tasks submitted while
    /// waiting, has finished.
    ///
    /// Returns the first failure, `TaskError::Cancelled` if tasks stopped
    /// because of an external cancellation, or the closing summary.
    pub async fn wait(&self) -> Result<GroupSummary, TaskError> {
        let _ = self.inner.state.compare_exchange(
            0,
            1,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.state.store(2, Ordering::Release);

        let summary = self.summary();
        let first_error = self
            .inner
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match first_error {
            Some(err) => Err(err),
            None if summary.cancelled > 0 => Err(TaskError::Cancelled),
            None => Ok(summary),
        }
    }

    /// Current task counts.
    pub fn summary(&self) -> GroupSummary {
        let inner = &self.inner;
        GroupSummary {
            submitted: inner.submitted.load(Ordering::Relaxed),
            succeeded: inner.succeeded.load(Ordering::Relaxed),
            failed: inner.failed.load(Ordering::Relaxed),
            cancelled: inner.cancelled.load(Ordering::Relaxed),
            rejected: inner.rejected.load(Ordering::Relaxed),
        }
    }
}

impl GroupInner {
    fn finish(&self, label: &str, typetag: &str, result: TaskResult) {
        match result {
            Ok(output) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                debug!(
                    group = %self.name,
                    key = label,
                    message = output.message.as_deref().unwrap_or(""),
                    "{} completed", typetag
                );
            }
            Err(TaskError::Cancelled) => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(group = %self.name, key = label, "{} cancelled", typetag);
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(group = %self.name, key = label, error = %err, "{} failed", typetag);
                {
                    let mut slot = self
                        .first_error
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                }
                self.cancel.cancel();
            }
        }
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
