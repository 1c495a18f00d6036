//! Per-entity bookkeeping.

use std::collections::{HashMap, VecDeque};

use gameplay_tags::{TagCountContainer, TagId};

use crate::ability::spec::SpecHandle;
use crate::ids::{AbilityId, Tick};

/// Grant-local state for one spec on one entity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrantState {
    /// Activation is gated until the clock passes this tick.
    pub cooldown_until: Tick,
}

/// A visibility edge queued for the interrupt pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagNotice {
    Added(TagId),
    Removed(TagId),
}

/// What a suspended task is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WakeSource {
    Event(TagId),
    TagAdded(TagId),
    TagRemoved(TagId),
}

/// Registered interest of one task slot, ordered by registration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Subscription {
    pub ability: AbilityId,
    pub task_index: usize,
    pub source: WakeSource,
}

/// All scheduler state scoped to one entity.
///
/// Kept separate from [`AbilityInstance`] storage so the scheduler can hold
/// a mutable instance borrow and a shared entity borrow at once.
///
/// [`AbilityInstance`]: crate::ability::AbilityInstance
pub(crate) struct EntityRuntime {
    /// Loose tags plus activation-owned tags, reference counted.
    pub tags: TagCountContainer,
    /// Identity tags blocked by live abilities, reference counted.
    pub blocked_ability_tags: TagCountContainer,
    pub grants: HashMap<SpecHandle, GrantState>,
    /// Live instance ids in activation order.
    pub active: Vec<AbilityId>,
    pub subscriptions: Vec<Subscription>,
    /// Tag edges awaiting the interrupt pass.
    pub notices: VecDeque<TagNotice>,
    /// Guards against re-entrant draining; the outermost drain owns the
    /// queue.
    pub draining: bool,
}

impl EntityRuntime {
    pub(crate) fn new() -> Self {
        Self {
            tags: TagCountContainer::new(),
            blocked_ability_tags: TagCountContainer::new(),
            grants: HashMap::new(),
            active: Vec::new(),
            subscriptions: Vec::new(),
            notices: VecDeque::new(),
            draining: false,
        }
    }

    /// Drops every interest registered by `ability`.
    pub(crate) fn forget_ability(&mut self, ability: AbilityId) {
        self.subscriptions.retain(|sub| sub.ability != ability);
    }

    /// Drops the interests of one task slot.
    pub(crate) fn forget_task(&mut self, ability: AbilityId, task_index: usize) {
        self.subscriptions
            .retain(|sub| !(sub.ability == ability && sub.task_index == task_index));
    }
}
