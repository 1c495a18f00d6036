//! Read-only views of live scheduler state.

use crate::ability::instance::{AbilityState, AuthorityMode};
use crate::ids::{AbilityId, EntityId, Tick};
use crate::task::TaskState;

/// Point-in-time view of one entity: visible tags plus live abilities.
///
/// Tag paths are sorted for stable comparison in tests and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntitySnapshot {
    pub entity: EntityId,
    pub clock: Tick,
    pub tags: Vec<String>,
    pub abilities: Vec<AbilitySnapshot>,
}

/// One live ability instance within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbilitySnapshot {
    pub id: AbilityId,
    pub name: String,
    pub state: AbilityState,
    pub authority: AuthorityMode,
    pub tasks: Vec<TaskSnapshot>,
}

/// One task slot within an ability snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskSnapshot {
    pub index: usize,
    pub name: String,
    pub state: TaskState,
}
