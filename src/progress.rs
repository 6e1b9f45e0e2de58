use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

/// Which stage of the pipeline a progress message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Octree,
    Mesh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

/// Immutable progress message sent from the worker to the outside.
///
/// Messages for one task are monotone non-decreasing in `progress`, and a
/// `completed`/`failed` message is always the final one for its task.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub task_id: u64,
    pub phase: Phase,
    pub progress: f64,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cooperative cancellation flag shared between the caller and the worker.
///
/// The builder polls it at every recursion step; the pipeline polls it
/// between phases. Setting it makes the current build unwind with
/// `MesherError::Cancelled` and discard all partial state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Wraps a progress callback and clamps reported fractions so the stream
/// stays monotone even when a sub-stage reports conservatively.
pub(crate) struct ProgressSink<'a> {
    task_id: u64,
    last: f64,
    callback: &'a mut dyn FnMut(ProgressUpdate),
}

impl<'a> ProgressSink<'a> {
    pub fn new(task_id: u64, callback: &'a mut dyn FnMut(ProgressUpdate)) -> Self {
        Self {
            task_id,
            last: 0.0,
            callback,
        }
    }

    pub fn running(&mut self, phase: Phase, progress: f64) {
        let progress = progress.clamp(self.last, 1.0);
        self.last = progress;
        (self.callback)(ProgressUpdate {
            task_id: self.task_id,
            phase,
            progress,
            status: TaskStatus::Running,
            error: None,
        });
    }

    pub fn completed(&mut self) {
        self.last = 1.0;
        (self.callback)(ProgressUpdate {
            task_id: self.task_id,
            phase: Phase::Mesh,
            progress: 1.0,
            status: TaskStatus::Completed,
            error: None,
        });
    }

    pub fn failed(&mut self, phase: Phase, error: String) {
        (self.callback)(ProgressUpdate {
            task_id: self.task_id,
            phase,
            progress: self.last,
            status: TaskStatus::Failed,
            error: Some(error),
        });
    }
}
