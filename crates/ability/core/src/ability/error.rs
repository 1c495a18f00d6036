//! Activation gate failures.

use gameplay_tags::TagId;
use thiserror::Error;

use crate::ability::spec::SpecHandle;
use crate::error::{ErrorSeverity, FrameworkError};
use crate::ids::{EntityId, Tick};

/// Why an activation request was rejected.
///
/// Gates are evaluated in a fixed order: existence, grant, cooldown,
/// blocked tags, required tags. The first failing gate wins, so an owner
/// that is both blocked and missing a requirement reports the block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActivationError {
    #[error("unknown entity {entity}")]
    UnknownEntity { entity: EntityId },

    #[error("unknown ability spec {handle}")]
    UnknownSpec { handle: SpecHandle },

    #[error("{handle} is not granted to {entity}")]
    NotGranted { entity: EntityId, handle: SpecHandle },

    #[error("on cooldown until {until}")]
    OnCooldown { until: Tick },

    /// The owner carries a blocking tag, or a live ability blocks this
    /// spec's identity. `tag` is the first offending query when known.
    #[error("blocked by tag")]
    BlockedByTag { tag: Option<TagId> },

    #[error("missing required tag")]
    MissingRequiredTag { tag: TagId },
}

impl FrameworkError for ActivationError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            // Gate rejections are normal gameplay outcomes.
            ActivationError::OnCooldown { .. }
            | ActivationError::BlockedByTag { .. }
            | ActivationError::MissingRequiredTag { .. } => ErrorSeverity::Recoverable,
            ActivationError::UnknownEntity { .. }
            | ActivationError::UnknownSpec { .. }
            | ActivationError::NotGranted { .. } => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ActivationError::UnknownEntity { .. } => "ABILITY_UNKNOWN_ENTITY",
            ActivationError::UnknownSpec { .. } => "ABILITY_UNKNOWN_SPEC",
            ActivationError::NotGranted { .. } => "ABILITY_NOT_GRANTED",
            ActivationError::OnCooldown { .. } => "ABILITY_ON_COOLDOWN",
            ActivationError::BlockedByTag { .. } => "ABILITY_BLOCKED_BY_TAG",
            ActivationError::MissingRequiredTag { .. } => "ABILITY_MISSING_REQUIRED_TAG",
        }
    }
}
