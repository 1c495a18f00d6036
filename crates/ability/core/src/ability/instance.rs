//! Live ability instances.

use arrayvec::ArrayVec;

use crate::ability::spec::SpecHandle;
use crate::config::AbilityConfig;
use crate::ids::{AbilityId, EntityId, Tick};
use crate::task::TaskSlot;

/// Instance lifecycle states.
///
/// `Activating` covers the window between passing the gates and the task
/// plan being spawned; interrupts arriving in that window still cancel the
/// instance. `Ended` is terminal and observable only through events, since
/// ended instances retire from the scheduler immediately.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AbilityState {
    Idle,
    Activating,
    Active,
    Ending,
    Ended,
}

impl AbilityState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, AbilityState::Ended)
    }

    /// States from which an end request does something.
    pub const fn can_end(self) -> bool {
        matches!(self, AbilityState::Activating | AbilityState::Active)
    }
}

/// Who vouches for this instance.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AuthorityMode {
    /// Activated by the simulation authority; never rolled back.
    Authoritative,
    /// Activated locally ahead of the authority; must be confirmed or it
    /// rolls back.
    Predicted,
    /// Predicted activation the authority has accepted.
    Confirmed,
}

/// Why an instance ended.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EndReason {
    /// Ran to completion or was ended explicitly by its owner.
    Completed,
    /// Ended by an external cancel, a cancel cascade, or grant revocation.
    Cancelled,
    /// A tag in the spec's cancel-on set appeared on the owner.
    InterruptedByTag,
    /// The authority rejected a predicted activation.
    PredictionRejected,
}

/// One live activation of a spec on one entity.
pub struct AbilityInstance {
    id: AbilityId,
    entity: EntityId,
    handle: SpecHandle,
    state: AbilityState,
    authority: AuthorityMode,
    tasks: ArrayVec<TaskSlot, { AbilityConfig::MAX_TASKS_PER_ABILITY }>,
    end_reason: Option<EndReason>,
    activated_at: Tick,
    /// Cooldown deadline before this activation overwrote it. Restored if a
    /// predicted activation is rejected.
    cooldown_before: Tick,
}

impl AbilityInstance {
    pub(crate) fn new(
        id: AbilityId,
        entity: EntityId,
        handle: SpecHandle,
        authority: AuthorityMode,
        activated_at: Tick,
    ) -> Self {
        Self {
            id,
            entity,
            handle,
            state: AbilityState::Idle,
            authority,
            tasks: ArrayVec::new(),
            end_reason: None,
            activated_at,
            cooldown_before: Tick::ZERO,
        }
    }

    pub fn id(&self) -> AbilityId {
        self.id
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn handle(&self) -> SpecHandle {
        self.handle
    }

    pub fn state(&self) -> AbilityState {
        self.state
    }

    pub fn authority(&self) -> AuthorityMode {
        self.authority
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn activated_at(&self) -> Tick {
        self.activated_at
    }

    pub fn tasks(&self) -> &[TaskSlot] {
        &self.tasks
    }

    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks.iter().all(|slot| slot.state().is_terminal())
    }

    pub(crate) fn set_state(&mut self, state: AbilityState) {
        self.state = state;
    }

    pub(crate) fn set_authority(&mut self, authority: AuthorityMode) {
        self.authority = authority;
    }

    pub(crate) fn set_end_reason(&mut self, reason: EndReason) {
        self.end_reason = Some(reason);
    }

    pub(crate) fn set_cooldown_before(&mut self, deadline: Tick) {
        self.cooldown_before = deadline;
    }

    pub(crate) fn cooldown_before(&self) -> Tick {
        self.cooldown_before
    }

    /// Appends a spawned task and returns its index.
    ///
    /// Plan length is validated against the slot capacity at spec
    /// registration, so the push cannot overflow.
    pub(crate) fn push_task(&mut self, slot: TaskSlot) -> usize {
        self.tasks.push(slot);
        self.tasks.len() - 1
    }

    pub(crate) fn task_mut(&mut self, index: usize) -> Option<&mut TaskSlot> {
        self.tasks.get_mut(index)
    }

    /// Cancels every live task, most recently spawned first.
    ///
    /// Returns `(index, name)` for each task this call actually cancelled.
    pub(crate) fn cancel_tasks_reverse(&mut self) -> Vec<(usize, &'static str)> {
        let mut cancelled = Vec::new();
        for index in (0..self.tasks.len()).rev() {
            let slot = &mut self.tasks[index];
            if slot.cancel() {
                cancelled.push((index, slot.name()));
            }
        }
        cancelled
    }
}

impl std::fmt::Debug for AbilityInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbilityInstance")
            .field("id", &self.id)
            .field("entity", &self.entity)
            .field("handle", &self.handle)
            .field("state", &self.state)
            .field("authority", &self.authority)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskCtx, TaskFault, TaskProgress};
    use gameplay_tags::TagContainer;

    struct Idle;

    impl Task for Idle {
        fn name(&self) -> &'static str {
            "idle"
        }

        fn activate(&mut self, _ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
            Ok(TaskProgress::Continue)
        }
    }

    #[test]
    fn cancel_walks_tasks_in_reverse_spawn_order() {
        let mut instance = AbilityInstance::new(
            AbilityId(1),
            EntityId(0),
            SpecHandle(0),
            AuthorityMode::Authoritative,
            Tick::ZERO,
        );
        let tags = TagContainer::new();
        let mut requests = Vec::new();
        for _ in 0..3 {
            let index = instance.push_task(crate::task::TaskSlot::new(Box::new(Idle)));
            let mut ctx = TaskCtx::new(Tick::ZERO, 0.0, &tags, &mut requests);
            instance
                .task_mut(index)
                .unwrap()
                .activate(&mut ctx)
                .unwrap();
        }

        let cancelled = instance.cancel_tasks_reverse();
        let order: Vec<usize> = cancelled.iter().map(|(index, _)| *index).collect();
        assert_eq!(order, vec![2, 1, 0]);
        assert!(instance.all_tasks_terminal());

        // Second sweep finds nothing live.
        assert!(instance.cancel_tasks_reverse().is_empty());
    }

    #[test]
    fn end_states() {
        assert!(AbilityState::Active.can_end());
        assert!(AbilityState::Activating.can_end());
        assert!(!AbilityState::Ending.can_end());
        assert!(!AbilityState::Ended.can_end());
        assert!(AbilityState::Ended.is_terminal());
    }
}
