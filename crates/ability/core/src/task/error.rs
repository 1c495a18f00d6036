//! Task-level errors.

use thiserror::Error;

use crate::error::{ErrorSeverity, FrameworkError};
use crate::task::TaskState;

/// Caller misused the task lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaskError {
    /// An operation was invoked in a state that does not allow it,
    /// e.g. activating a task twice.
    #[error("cannot {operation} task in state `{state}`")]
    InvalidTaskState {
        operation: &'static str,
        state: TaskState,
    },
}

impl FrameworkError for TaskError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            TaskError::InvalidTaskState { .. } => "TASK_INVALID_STATE",
        }
    }
}

/// Unrecoverable failure raised inside a task callback.
///
/// Faults never unwind into the scheduler: the slot catches them, cancels
/// the task, and surfaces the reason through the task-ended event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("task fault: {reason}")]
pub struct TaskFault {
    pub reason: String,
}

impl TaskFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl FrameworkError for TaskFault {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Internal
    }

    fn error_code(&self) -> &'static str {
        "TASK_FAULT"
    }
}
