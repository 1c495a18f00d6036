//! Observable facts emitted by the scheduler.
//!
//! Events are the only channel through which hosts observe lifecycle
//! transitions; the scheduler retires ended state eagerly, so polling it
//! after the fact misses. Every mutation path appends here and callers
//! collect with [`AbilityScheduler::drain_events`].
//!
//! [`AbilityScheduler::drain_events`]: crate::scheduler::AbilityScheduler::drain_events

use gameplay_tags::TagId;

use crate::ability::instance::{AuthorityMode, EndReason};
use crate::ability::spec::SpecHandle;
use crate::ids::{AbilityId, EntityId, Tick};
use crate::task::TaskOutcome;

/// One observable scheduler fact, in emission order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AbilityEvent {
    /// An activation passed every gate and its plan was spawned.
    Activated {
        entity: EntityId,
        ability: AbilityId,
        handle: SpecHandle,
        name: String,
        authority: AuthorityMode,
        clock: Tick,
    },
    /// An instance reached its terminal state and retired.
    Ended {
        entity: EntityId,
        ability: AbilityId,
        handle: SpecHandle,
        name: String,
        reason: EndReason,
        clock: Tick,
    },
    /// The authority accepted a predicted activation.
    AuthorityConfirmed {
        entity: EntityId,
        ability: AbilityId,
        clock: Tick,
    },
    /// A task was spawned and activated.
    TaskStarted {
        entity: EntityId,
        ability: AbilityId,
        task_index: usize,
        task: String,
        clock: Tick,
    },
    /// A task reached its terminal state. `fault` carries the failure
    /// reason when the task was cancelled by its own fault.
    TaskEnded {
        entity: EntityId,
        ability: AbilityId,
        task_index: usize,
        task: String,
        outcome: TaskOutcome,
        fault: Option<String>,
        clock: Tick,
    },
    /// A tag became visible on an entity.
    TagAdded {
        entity: EntityId,
        tag: TagId,
        path: String,
        clock: Tick,
    },
    /// A tag stopped being visible on an entity.
    TagRemoved {
        entity: EntityId,
        tag: TagId,
        path: String,
        clock: Tick,
    },
}

impl AbilityEvent {
    /// Entity this event concerns.
    pub fn entity(&self) -> EntityId {
        match self {
            AbilityEvent::Activated { entity, .. }
            | AbilityEvent::Ended { entity, .. }
            | AbilityEvent::AuthorityConfirmed { entity, .. }
            | AbilityEvent::TaskStarted { entity, .. }
            | AbilityEvent::TaskEnded { entity, .. }
            | AbilityEvent::TagAdded { entity, .. }
            | AbilityEvent::TagRemoved { entity, .. } => *entity,
        }
    }

    /// Tick at which the event was emitted.
    pub fn clock(&self) -> Tick {
        match self {
            AbilityEvent::Activated { clock, .. }
            | AbilityEvent::Ended { clock, .. }
            | AbilityEvent::AuthorityConfirmed { clock, .. }
            | AbilityEvent::TaskStarted { clock, .. }
            | AbilityEvent::TaskEnded { clock, .. }
            | AbilityEvent::TagAdded { clock, .. }
            | AbilityEvent::TagRemoved { clock, .. } => *clock,
        }
    }
}
