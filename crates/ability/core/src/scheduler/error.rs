//! Scheduler bookkeeping errors.

use thiserror::Error;

use crate::ability::spec::SpecHandle;
use crate::error::{ErrorSeverity, FrameworkError};
use crate::ids::EntityId;

/// A scheduler call referenced something the scheduler does not track.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SchedulerError {
    #[error("unknown entity {entity}")]
    UnknownEntity { entity: EntityId },

    #[error("unknown ability spec {handle}")]
    UnknownSpec { handle: SpecHandle },
}

impl FrameworkError for SchedulerError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            SchedulerError::UnknownEntity { .. } => "SCHED_UNKNOWN_ENTITY",
            SchedulerError::UnknownSpec { .. } => "SCHED_UNKNOWN_SPEC",
        }
    }
}
