//! Unified error type surfaced by the runtime API.
//!
//! Wraps worker-coordination failures and the scheduler's own rejections so
//! callers deal with one error enum at the async boundary.

use thiserror::Error;
use tokio::sync::oneshot;

use ability_core::{ActivationError, SchedulerError, SpecError};

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("simulation worker command channel closed")]
    CommandChannelClosed,

    #[error("simulation worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("simulation worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    /// Activation gate rejection; recoverable, retry after state changes.
    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Spec(#[from] SpecError),
}
