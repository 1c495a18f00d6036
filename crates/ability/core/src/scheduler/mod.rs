//! The ability scheduler: one owner for all per-entity ability state.
//!
//! # Design
//! - Single-threaded by construction. The scheduler is plain `&mut self`
//!   state; concurrent callers serialize through a channel in front of it.
//! - Tick pipeline per entity: advance active tasks in activation order,
//!   then drain tag interrupts, then let completion policy retire drained
//!   instances. Interrupts raised mid-tick are drained at the mutation
//!   point, not deferred to the next frame.
//! - Tag edges push a notice onto the owning entity's queue and the queue
//!   is drained before the mutating call returns. Cancellations observed by
//!   the caller are therefore already final.
//! - Ended instances retire eagerly: they leave the maps the moment they
//!   end, and stale ids miss harmlessly.

mod entity;
pub mod error;
pub mod events;
pub mod snapshot;

pub use error::SchedulerError;
pub use events::AbilityEvent;
pub use snapshot::{AbilitySnapshot, EntitySnapshot, TaskSnapshot};

use std::collections::BTreeMap;
use std::sync::Arc;

use gameplay_tags::{TagContainer, TagId, TagRegistry};

use crate::ability::error::ActivationError;
use crate::ability::instance::{AbilityInstance, AbilityState, AuthorityMode, EndReason};
use crate::ability::spec::{AbilitySpec, CompletionPolicy, SpecError, SpecHandle};
use crate::config::AbilityConfig;
use crate::env::AbilityEnv;
use crate::ids::{AbilityId, EntityId, Tick};
use crate::scheduler::entity::{EntityRuntime, GrantState, Subscription, TagNotice, WakeSource};
use crate::task::{
    GameplayEvent, TaskCtx, TaskOutcome, TaskRequest, TaskSlot, TaskState, TaskWake,
};

/// A registered spec plus precomputed matching state.
struct SpecRecord {
    spec: AbilitySpec,
    /// Closure container over the spec's ability tags; answers "does this
    /// ability's identity match query Q" in one lookup.
    identity: TagContainer,
}

/// Drives ability activation, task scheduling, tag interrupts, and
/// prediction reconciliation for a set of entities.
pub struct AbilityScheduler {
    registry: Arc<TagRegistry>,
    config: AbilityConfig,
    specs: Vec<SpecRecord>,
    entities: BTreeMap<EntityId, EntityRuntime>,
    /// Live instances only; terminal instances are removed eagerly.
    instances: BTreeMap<AbilityId, AbilityInstance>,
    /// Next instance id. Monotonic, never reused, so id order is
    /// activation order.
    next_ability: u64,
    clock: Tick,
    outbox: Vec<AbilityEvent>,
}

impl AbilityScheduler {
    pub fn new(registry: Arc<TagRegistry>, config: AbilityConfig) -> Self {
        Self {
            registry,
            config,
            specs: Vec::new(),
            entities: BTreeMap::new(),
            instances: BTreeMap::new(),
            next_ability: 0,
            clock: Tick::ZERO,
            outbox: Vec::new(),
        }
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    pub fn clock(&self) -> Tick {
        self.clock
    }

    // ========================================================================
    // Specs and grants
    // ========================================================================

    /// Registers a spec and returns the handle entities are granted by.
    pub fn register_spec(&mut self, spec: AbilitySpec) -> Result<SpecHandle, SpecError> {
        if spec.plan.len() > AbilityConfig::MAX_TASKS_PER_ABILITY {
            return Err(SpecError::plan_too_long(spec.plan.len()));
        }
        let identity = TagContainer::from_tags(self.registry.as_ref(), &spec.ability_tags);
        let handle = SpecHandle(self.specs.len() as u32);
        self.specs.push(SpecRecord { spec, identity });
        Ok(handle)
    }

    pub fn spec(&self, handle: SpecHandle) -> Option<&AbilitySpec> {
        self.specs.get(handle.index()).map(|record| &record.spec)
    }

    /// Starts tracking an entity. Returns false if it was already known.
    pub fn add_entity(&mut self, entity: EntityId) -> bool {
        if self.entities.contains_key(&entity) {
            return false;
        }
        self.entities.insert(entity, EntityRuntime::new());
        true
    }

    /// Cancels everything the entity is running and forgets it.
    pub fn remove_entity(&mut self, entity: EntityId) -> bool {
        if !self.entities.contains_key(&entity) {
            return false;
        }
        self.cancel_entity(entity);
        self.entities.remove(&entity);
        true
    }

    /// Grants a spec to an entity. Returns true on a fresh grant.
    pub fn grant(&mut self, entity: EntityId, handle: SpecHandle) -> Result<bool, SchedulerError> {
        if self.specs.get(handle.index()).is_none() {
            return Err(SchedulerError::UnknownSpec { handle });
        }
        let Some(runtime) = self.entities.get_mut(&entity) else {
            return Err(SchedulerError::UnknownEntity { entity });
        };
        if runtime.grants.contains_key(&handle) {
            return Ok(false);
        }
        runtime.grants.insert(
            handle,
            GrantState {
                cooldown_until: Tick::ZERO,
            },
        );
        Ok(true)
    }

    /// Removes a grant, cancelling any live instances of the spec first.
    pub fn revoke(&mut self, entity: EntityId, handle: SpecHandle) -> Result<bool, SchedulerError> {
        if self.specs.get(handle.index()).is_none() {
            return Err(SchedulerError::UnknownSpec { handle });
        }
        let victims: Vec<AbilityId> = {
            let Some(runtime) = self.entities.get(&entity) else {
                return Err(SchedulerError::UnknownEntity { entity });
            };
            runtime
                .active
                .iter()
                .copied()
                .filter(|id| {
                    self.instances
                        .get(id)
                        .map_or(false, |instance| instance.handle() == handle)
                })
                .collect()
        };
        for victim in victims.into_iter().rev() {
            self.end_internal(victim, EndReason::Cancelled);
        }
        let Some(runtime) = self.entities.get_mut(&entity) else {
            return Err(SchedulerError::UnknownEntity { entity });
        };
        Ok(runtime.grants.remove(&handle).is_some())
    }

    // ========================================================================
    // Tag mutation
    // ========================================================================

    /// Grants one stack of a loose tag. Interrupts triggered by the edge
    /// have already run when this returns.
    pub fn grant_tag(&mut self, entity: EntityId, tag: TagId) -> Result<bool, SchedulerError> {
        if !self.entities.contains_key(&entity) {
            return Err(SchedulerError::UnknownEntity { entity });
        }
        let edge = self.apply_tag_grant(entity, tag);
        self.drain_notices(entity);
        Ok(edge)
    }

    /// Releases one stack of a loose tag.
    pub fn revoke_tag(&mut self, entity: EntityId, tag: TagId) -> Result<bool, SchedulerError> {
        if !self.entities.contains_key(&entity) {
            return Err(SchedulerError::UnknownEntity { entity });
        }
        let edge = self.apply_tag_revoke(entity, tag);
        self.drain_notices(entity);
        Ok(edge)
    }

    /// Visible tags of an entity, activation-owned stacks included.
    pub fn tags(&self, entity: EntityId) -> Option<&TagContainer> {
        self.entities
            .get(&entity)
            .map(|runtime| runtime.tags.visible())
    }

    // ========================================================================
    // Activation
    // ========================================================================

    /// Runs the activation gates and, if they all pass, commits the
    /// activation: displaced abilities are cancelled, owned tags applied,
    /// the task plan spawned, and any resulting interrupts drained, all
    /// before this returns.
    ///
    /// Gate order is fixed: entity, spec, grant, cooldown, blocked tags,
    /// required tags. A rejected activation mutates nothing.
    pub fn try_activate(
        &mut self,
        env: &AbilityEnv<'_>,
        entity: EntityId,
        handle: SpecHandle,
    ) -> Result<AbilityId, ActivationError> {
        let clock = self.clock;

        let (spec, cooldown_before) = {
            let Some(runtime) = self.entities.get(&entity) else {
                return Err(ActivationError::UnknownEntity { entity });
            };
            let Some(record) = self.specs.get(handle.index()) else {
                return Err(ActivationError::UnknownSpec { handle });
            };
            let Some(grant) = runtime.grants.get(&handle) else {
                return Err(ActivationError::NotGranted { entity, handle });
            };
            if grant.cooldown_until > clock {
                return Err(ActivationError::OnCooldown {
                    until: grant.cooldown_until,
                });
            }
            let owner = runtime.tags.visible();
            if let Some(tag) = record.spec.blocking_tag_in(owner) {
                return Err(ActivationError::BlockedByTag { tag: Some(tag) });
            }
            if let Some(tag) = runtime
                .blocked_ability_tags
                .visible()
                .iter()
                .find(|&tag| record.identity.matches_tag(tag))
            {
                return Err(ActivationError::BlockedByTag { tag: Some(tag) });
            }
            if let Some(tag) = record.spec.missing_required_in(owner) {
                return Err(ActivationError::MissingRequiredTag { tag });
            }
            (record.spec.clone(), grant.cooldown_until)
        };

        let authority = if env.is_locally_predicting(entity) {
            AuthorityMode::Predicted
        } else {
            AuthorityMode::Authoritative
        };
        let ability = AbilityId(self.next_ability);
        self.next_ability += 1;

        let mut instance = AbilityInstance::new(ability, entity, handle, authority, clock);
        instance.set_state(AbilityState::Activating);
        instance.set_cooldown_before(cooldown_before);

        // Displace live abilities this spec cancels, oldest first.
        if !spec.cancels_abilities_with.is_empty() {
            let victims: Vec<AbilityId> = {
                let Some(runtime) = self.entities.get(&entity) else {
                    return Err(ActivationError::UnknownEntity { entity });
                };
                runtime
                    .active
                    .iter()
                    .copied()
                    .filter(|id| self.identity_matches_any(*id, &spec.cancels_abilities_with))
                    .collect()
            };
            for victim in victims {
                self.end_internal(victim, EndReason::Cancelled);
            }
        }

        self.instances.insert(ability, instance);
        {
            let Some(runtime) = self.entities.get_mut(&entity) else {
                return Err(ActivationError::UnknownEntity { entity });
            };
            runtime.active.push(ability);
            if let Some(grant) = runtime.grants.get_mut(&handle) {
                grant.cooldown_until = clock + spec.cooldown_ticks;
            }
        }
        if let Some(instance) = self.instances.get_mut(&ability) {
            instance.set_state(AbilityState::Active);
        }
        self.outbox.push(AbilityEvent::Activated {
            entity,
            ability,
            handle,
            name: spec.name.clone(),
            authority,
            clock,
        });

        // Tag effects. Every edge drains interrupts immediately and an
        // interrupt can take down this very instance, so re-check liveness
        // between steps.
        for &tag in &spec.activation_owned_tags {
            if self.instances.get(&ability).is_none() {
                break;
            }
            if self.apply_tag_grant(entity, tag) {
                self.drain_notices(entity);
            }
        }
        for &tag in &spec.blocks_abilities_with {
            if self.instances.get(&ability).is_none() {
                break;
            }
            if let Some(runtime) = self.entities.get_mut(&entity) {
                runtime
                    .blocked_ability_tags
                    .grant(self.registry.as_ref(), tag);
            }
        }

        // Spawn the whole plan before activating anything, so completion
        // checks during activation see the full task set.
        let task_count = spec.plan.len();
        if let Some(instance) = self.instances.get_mut(&ability) {
            for kind in &spec.plan {
                instance.push_task(TaskSlot::new(kind.instantiate()));
            }
        }
        for index in 0..task_count {
            if self.instances.get(&ability).is_none() {
                break;
            }
            self.activate_task(entity, ability, index);
        }
        self.maybe_complete(ability);
        self.drain_notices(entity);
        Ok(ability)
    }

    // ========================================================================
    // Ending
    // ========================================================================

    /// Ends a live instance. Unknown (already retired) ids are no-ops, so
    /// holding a stale id is safe.
    pub fn end_ability(&mut self, ability: AbilityId, reason: EndReason) {
        self.end_internal(ability, reason);
    }

    /// Cancels every live instance on the entity, newest first.
    pub fn cancel_all(&mut self, entity: EntityId) -> Result<(), SchedulerError> {
        if !self.entities.contains_key(&entity) {
            return Err(SchedulerError::UnknownEntity { entity });
        }
        self.cancel_entity(entity);
        Ok(())
    }

    // ========================================================================
    // Events in
    // ========================================================================

    /// Routes a gameplay event to suspended tasks subscribed to its exact
    /// tag, in subscription order.
    pub fn deliver_event(
        &mut self,
        entity: EntityId,
        event: GameplayEvent,
    ) -> Result<(), SchedulerError> {
        let targets: Vec<(AbilityId, usize)> = {
            let Some(runtime) = self.entities.get(&entity) else {
                return Err(SchedulerError::UnknownEntity { entity });
            };
            runtime
                .subscriptions
                .iter()
                .filter(|sub| matches!(sub.source, WakeSource::Event(tag) if tag == event.tag))
                .map(|sub| (sub.ability, sub.task_index))
                .collect()
        };
        for (ability, task_index) in targets {
            self.wake_task(entity, ability, task_index, TaskWake::Event(event.clone()));
        }
        self.drain_notices(entity);
        Ok(())
    }

    // ========================================================================
    // Prediction
    // ========================================================================

    /// Resolves one predicted activation. Returns true if the id named a
    /// live predicted instance and the verdict was consumed.
    ///
    /// Acceptance upgrades the instance to confirmed; rejection unwinds it
    /// like a cancellation and restores the cooldown it charged.
    pub fn confirm_authority(&mut self, ability: AbilityId, accepted: bool) -> bool {
        let Some(instance) = self.instances.get(&ability) else {
            return false;
        };
        if instance.authority() != AuthorityMode::Predicted {
            return false;
        }
        let entity = instance.entity();
        if accepted {
            if let Some(instance) = self.instances.get_mut(&ability) {
                instance.set_authority(AuthorityMode::Confirmed);
            }
            self.outbox.push(AbilityEvent::AuthorityConfirmed {
                entity,
                ability,
                clock: self.clock,
            });
        } else {
            self.end_internal(ability, EndReason::PredictionRejected);
        }
        true
    }

    /// Applies a batch of authority verdicts: acceptances first, then
    /// rejections newest-activation-first so rollbacks unwind in reverse.
    pub fn confirm_batch(&mut self, results: &[(AbilityId, bool)]) {
        for &(ability, accepted) in results {
            if accepted {
                self.confirm_authority(ability, true);
            }
        }
        let mut rejected: Vec<AbilityId> = results
            .iter()
            .filter(|(_, accepted)| !accepted)
            .map(|(ability, _)| *ability)
            .collect();
        // Ids are monotonic; descending id order is reverse activation order.
        rejected.sort_unstable_by(|a, b| b.cmp(a));
        for ability in rejected {
            self.confirm_authority(ability, false);
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advances the clock and every entity: active tasks run in activation
    /// then spawn order, suspended tasks stay parked, and interrupts fire
    /// at the mutation that caused them.
    pub fn tick(&mut self, dt: f32) {
        self.clock = self.clock + 1;
        let entities: Vec<EntityId> = self.entities.keys().copied().collect();
        for entity in entities {
            let abilities: Vec<AbilityId> = match self.entities.get(&entity) {
                Some(runtime) => runtime.active.clone(),
                None => continue,
            };
            for ability in abilities {
                let task_count = match self.instances.get(&ability) {
                    Some(instance) if instance.state() == AbilityState::Active => {
                        instance.tasks().len()
                    }
                    _ => continue,
                };
                for index in 0..task_count {
                    self.tick_task(entity, ability, index, dt);
                    if self.instances.get(&ability).is_none() {
                        break;
                    }
                }
            }
            self.drain_notices(entity);
        }
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Takes every event emitted since the last drain, in emission order.
    pub fn drain_events(&mut self) -> Vec<AbilityEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Live instance lookup. Ended instances are gone.
    pub fn instance(&self, ability: AbilityId) -> Option<&AbilityInstance> {
        self.instances.get(&ability)
    }

    pub fn snapshot(&self, entity: EntityId) -> Option<EntitySnapshot> {
        let runtime = self.entities.get(&entity)?;
        let mut tags: Vec<String> = runtime
            .tags
            .visible()
            .iter()
            .filter_map(|tag| self.registry.resolve(tag))
            .map(str::to_string)
            .collect();
        tags.sort();
        let abilities = runtime
            .active
            .iter()
            .filter_map(|id| {
                let instance = self.instances.get(id)?;
                let record = self.specs.get(instance.handle().index())?;
                Some(AbilitySnapshot {
                    id: *id,
                    name: record.spec.name.clone(),
                    state: instance.state(),
                    authority: instance.authority(),
                    tasks: instance
                        .tasks()
                        .iter()
                        .enumerate()
                        .map(|(index, slot)| TaskSnapshot {
                            index,
                            name: slot.name().to_string(),
                            state: slot.state(),
                        })
                        .collect(),
                })
            })
            .collect();
        Some(EntitySnapshot {
            entity,
            clock: self.clock,
            tags,
            abilities,
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn cancel_entity(&mut self, entity: EntityId) {
        let mut live: Vec<AbilityId> = match self.entities.get(&entity) {
            Some(runtime) => runtime.active.clone(),
            None => return,
        };
        live.reverse();
        for ability in live {
            self.end_internal(ability, EndReason::Cancelled);
        }
    }

    /// True if the ability is live and its identity matches any query.
    fn identity_matches_any(&self, ability: AbilityId, queries: &[TagId]) -> bool {
        let Some(instance) = self.instances.get(&ability) else {
            return false;
        };
        if !instance.state().can_end() {
            return false;
        }
        self.specs
            .get(instance.handle().index())
            .map_or(false, |record| {
                queries
                    .iter()
                    .any(|&query| record.identity.matches_tag(query))
            })
    }

    fn end_internal(&mut self, ability: AbilityId, reason: EndReason) {
        let clock = self.clock;
        let (entity, handle) = {
            let Some(instance) = self.instances.get_mut(&ability) else {
                return;
            };
            if !instance.state().can_end() {
                return;
            }
            instance.set_state(AbilityState::Ending);
            (instance.entity(), instance.handle())
        };

        // Tasks go down most recently spawned first. Cancellation releases
        // their wake interests; no task callback runs after this sweep.
        let cancelled = match self.instances.get_mut(&ability) {
            Some(instance) => instance.cancel_tasks_reverse(),
            None => Vec::new(),
        };
        for (task_index, task) in cancelled {
            if let Some(runtime) = self.entities.get_mut(&entity) {
                runtime.forget_task(ability, task_index);
            }
            self.outbox.push(AbilityEvent::TaskEnded {
                entity,
                ability,
                task_index,
                task: task.to_string(),
                outcome: TaskOutcome::Cancelled,
                fault: None,
                clock,
            });
        }

        let (name, owned, blocks) = match self.specs.get(handle.index()) {
            Some(record) => (
                record.spec.name.clone(),
                record.spec.activation_owned_tags.clone(),
                record.spec.blocks_abilities_with.clone(),
            ),
            None => (String::new(), Vec::new(), Vec::new()),
        };

        // Release the instance's tag footprint. Removal edges queue
        // notices; they fire once the instance has fully retired.
        for tag in owned {
            self.apply_tag_revoke(entity, tag);
        }
        for tag in blocks {
            if let Some(runtime) = self.entities.get_mut(&entity) {
                runtime
                    .blocked_ability_tags
                    .revoke(self.registry.as_ref(), tag);
            }
        }

        // A rejected prediction never legitimately charged its cooldown.
        if reason == EndReason::PredictionRejected {
            let restore = self
                .instances
                .get(&ability)
                .map(|instance| instance.cooldown_before());
            if let Some(deadline) = restore {
                if let Some(runtime) = self.entities.get_mut(&entity) {
                    if let Some(grant) = runtime.grants.get_mut(&handle) {
                        grant.cooldown_until = deadline;
                    }
                }
            }
        }

        if let Some(instance) = self.instances.get_mut(&ability) {
            instance.set_state(AbilityState::Ended);
            instance.set_end_reason(reason);
        }
        self.outbox.push(AbilityEvent::Ended {
            entity,
            ability,
            handle,
            name,
            reason,
            clock,
        });

        // Eager retirement: stale ids now miss in every map.
        if let Some(runtime) = self.entities.get_mut(&entity) {
            runtime.active.retain(|&id| id != ability);
            runtime.forget_ability(ability);
        }
        self.instances.remove(&ability);

        self.drain_notices(entity);
    }

    /// Ends an instance with a completed outcome once its policy says the
    /// plan has drained.
    fn maybe_complete(&mut self, ability: AbilityId) {
        let done = match self.instances.get(&ability) {
            Some(instance) if instance.state() == AbilityState::Active => self
                .specs
                .get(instance.handle().index())
                .map_or(false, |record| {
                    record.spec.completion == CompletionPolicy::DrainTasks
                        && instance.all_tasks_terminal()
                }),
            _ => false,
        };
        if done {
            self.end_internal(ability, EndReason::Completed);
        }
    }

    // ------------------------------------------------------------------------
    // Task plumbing
    // ------------------------------------------------------------------------

    fn activate_task(&mut self, entity: EntityId, ability: AbilityId, index: usize) {
        let clock = self.clock;
        let mut requests = Vec::new();
        let (name, fault, outcome) = {
            let Some(instance) = self.instances.get_mut(&ability) else {
                return;
            };
            let Some(runtime) = self.entities.get(&entity) else {
                return;
            };
            let owner_tags = runtime.tags.visible();
            let Some(slot) = instance.task_mut(index) else {
                return;
            };
            let mut ctx = TaskCtx::new(clock, 0.0, owner_tags, &mut requests);
            let outcome = match slot.activate(&mut ctx) {
                Ok(outcome) => outcome,
                // Slot already driven or cancelled before activation.
                Err(_) => return,
            };
            (
                slot.name(),
                slot.fault().map(|fault| fault.reason.clone()),
                outcome,
            )
        };
        self.outbox.push(AbilityEvent::TaskStarted {
            entity,
            ability,
            task_index: index,
            task: name.to_string(),
            clock,
        });
        self.apply_requests(entity, ability, index, requests);
        if let Some(outcome) = outcome {
            self.finish_task(entity, ability, index, name, fault, outcome);
        }
    }

    fn tick_task(&mut self, entity: EntityId, ability: AbilityId, index: usize, dt: f32) {
        let clock = self.clock;
        let mut requests = Vec::new();
        let (name, fault, outcome) = {
            let Some(instance) = self.instances.get_mut(&ability) else {
                return;
            };
            let Some(runtime) = self.entities.get(&entity) else {
                return;
            };
            let owner_tags = runtime.tags.visible();
            let Some(slot) = instance.task_mut(index) else {
                return;
            };
            if slot.state() != TaskState::Active {
                return;
            }
            let mut ctx = TaskCtx::new(clock, dt, owner_tags, &mut requests);
            let outcome = slot.tick(&mut ctx);
            (
                slot.name(),
                slot.fault().map(|fault| fault.reason.clone()),
                outcome,
            )
        };
        self.apply_requests(entity, ability, index, requests);
        if let Some(outcome) = outcome {
            self.finish_task(entity, ability, index, name, fault, outcome);
        }
    }

    fn wake_task(
        &mut self,
        entity: EntityId,
        ability: AbilityId,
        task_index: usize,
        wake: TaskWake,
    ) {
        let clock = self.clock;
        let mut requests = Vec::new();
        let (name, fault, outcome) = {
            let Some(instance) = self.instances.get_mut(&ability) else {
                return;
            };
            let Some(runtime) = self.entities.get(&entity) else {
                return;
            };
            let owner_tags = runtime.tags.visible();
            let Some(slot) = instance.task_mut(task_index) else {
                return;
            };
            if slot.state() != TaskState::Suspended {
                return;
            }
            let mut ctx = TaskCtx::new(clock, 0.0, owner_tags, &mut requests);
            let outcome = slot.deliver(&mut ctx, &wake);
            (
                slot.name(),
                slot.fault().map(|fault| fault.reason.clone()),
                outcome,
            )
        };
        self.apply_requests(entity, ability, task_index, requests);
        if let Some(outcome) = outcome {
            self.finish_task(entity, ability, task_index, name, fault, outcome);
        }
    }

    /// Applies the side effects a task queued during one callback.
    /// Grants and revokes drain their interrupts before the next request.
    fn apply_requests(
        &mut self,
        entity: EntityId,
        ability: AbilityId,
        task_index: usize,
        requests: Vec<TaskRequest>,
    ) {
        for request in requests {
            match request {
                TaskRequest::SubscribeEvent(tag) => {
                    self.subscribe(entity, ability, task_index, WakeSource::Event(tag));
                }
                TaskRequest::SubscribeTagAdded(tag) => {
                    self.subscribe(entity, ability, task_index, WakeSource::TagAdded(tag));
                }
                TaskRequest::SubscribeTagRemoved(tag) => {
                    self.subscribe(entity, ability, task_index, WakeSource::TagRemoved(tag));
                }
                TaskRequest::GrantTag(tag) => {
                    self.apply_tag_grant(entity, tag);
                    self.drain_notices(entity);
                }
                TaskRequest::RevokeTag(tag) => {
                    self.apply_tag_revoke(entity, tag);
                    self.drain_notices(entity);
                }
            }
        }
    }

    /// Registers a wake interest, unless the requesting slot already went
    /// terminal during the same callback.
    fn subscribe(
        &mut self,
        entity: EntityId,
        ability: AbilityId,
        task_index: usize,
        source: WakeSource,
    ) {
        let live = self
            .instances
            .get(&ability)
            .and_then(|instance| instance.tasks().get(task_index))
            .map_or(false, |slot| !slot.state().is_terminal());
        if !live {
            return;
        }
        if let Some(runtime) = self.entities.get_mut(&entity) {
            runtime.subscriptions.push(Subscription {
                ability,
                task_index,
                source,
            });
        }
    }

    /// Terminal bookkeeping for one task: release its wake interests, emit
    /// the task-ended event, and let the owner's completion policy react.
    fn finish_task(
        &mut self,
        entity: EntityId,
        ability: AbilityId,
        task_index: usize,
        task: &'static str,
        fault: Option<String>,
        outcome: TaskOutcome,
    ) {
        if let Some(runtime) = self.entities.get_mut(&entity) {
            runtime.forget_task(ability, task_index);
        }
        self.outbox.push(AbilityEvent::TaskEnded {
            entity,
            ability,
            task_index,
            task: task.to_string(),
            outcome,
            fault,
            clock: self.clock,
        });
        self.maybe_complete(ability);
    }

    // ------------------------------------------------------------------------
    // Tag plumbing
    // ------------------------------------------------------------------------

    /// Grants one stack. On a visibility edge, emits the event and queues
    /// an interrupt notice. Does not drain.
    fn apply_tag_grant(&mut self, entity: EntityId, tag: TagId) -> bool {
        let Some(runtime) = self.entities.get_mut(&entity) else {
            return false;
        };
        if !runtime.tags.grant(self.registry.as_ref(), tag) {
            return false;
        }
        runtime.notices.push_back(TagNotice::Added(tag));
        let path = self.tag_path(tag);
        self.outbox.push(AbilityEvent::TagAdded {
            entity,
            tag,
            path,
            clock: self.clock,
        });
        true
    }

    /// Releases one stack; the mirror of [`Self::apply_tag_grant`].
    fn apply_tag_revoke(&mut self, entity: EntityId, tag: TagId) -> bool {
        let Some(runtime) = self.entities.get_mut(&entity) else {
            return false;
        };
        if !runtime.tags.revoke(self.registry.as_ref(), tag) {
            return false;
        }
        runtime.notices.push_back(TagNotice::Removed(tag));
        let path = self.tag_path(tag);
        self.outbox.push(AbilityEvent::TagRemoved {
            entity,
            tag,
            path,
            clock: self.clock,
        });
        true
    }

    /// Drains the entity's notice queue: added tags cancel matching live
    /// abilities and wake watchers, removed tags wake watchers.
    ///
    /// Re-entrant calls return immediately; the outermost drain owns the
    /// queue, so nested mutations append and are processed in order.
    fn drain_notices(&mut self, entity: EntityId) {
        {
            let Some(runtime) = self.entities.get_mut(&entity) else {
                return;
            };
            if runtime.draining {
                return;
            }
            runtime.draining = true;
        }
        let mut processed: u32 = 0;
        while let Some(notice) = self.pop_notice(entity) {
            processed += 1;
            if processed > self.config.max_notice_passes {
                // Runaway grant/revoke feedback loop; drop the remainder.
                if let Some(runtime) = self.entities.get_mut(&entity) {
                    runtime.notices.clear();
                }
                break;
            }
            match notice {
                TagNotice::Added(tag) => {
                    self.interrupt_on_added(entity, tag);
                    self.wake_tag_watchers(
                        entity,
                        WakeSource::TagAdded(tag),
                        TaskWake::TagAdded(tag),
                    );
                }
                TagNotice::Removed(tag) => {
                    self.wake_tag_watchers(
                        entity,
                        WakeSource::TagRemoved(tag),
                        TaskWake::TagRemoved(tag),
                    );
                }
            }
        }
        if let Some(runtime) = self.entities.get_mut(&entity) {
            runtime.draining = false;
        }
    }

    fn pop_notice(&mut self, entity: EntityId) -> Option<TagNotice> {
        self.entities.get_mut(&entity)?.notices.pop_front()
    }

    /// Cancels live abilities whose cancel-on set matches an added tag.
    /// The added tag matches a query if it equals it or descends from it.
    fn interrupt_on_added(&mut self, entity: EntityId, tag: TagId) {
        let victims: Vec<AbilityId> = {
            let Some(runtime) = self.entities.get(&entity) else {
                return;
            };
            runtime
                .active
                .iter()
                .copied()
                .filter(|id| self.cancels_on(*id, tag))
                .collect()
        };
        for victim in victims {
            self.end_internal(victim, EndReason::InterruptedByTag);
        }
    }

    fn cancels_on(&self, ability: AbilityId, tag: TagId) -> bool {
        let Some(instance) = self.instances.get(&ability) else {
            return false;
        };
        if !instance.state().can_end() {
            return false;
        }
        let Some(record) = self.specs.get(instance.handle().index()) else {
            return false;
        };
        record
            .spec
            .cancel_on_tags
            .iter()
            .any(|&query| query == tag || self.registry.is_child_of(tag, query))
    }

    fn wake_tag_watchers(&mut self, entity: EntityId, source: WakeSource, wake: TaskWake) {
        let targets: Vec<(AbilityId, usize)> = {
            let Some(runtime) = self.entities.get(&entity) else {
                return;
            };
            runtime
                .subscriptions
                .iter()
                .filter(|sub| sub.source == source)
                .map(|sub| (sub.ability, sub.task_index))
                .collect()
        };
        for (ability, task_index) in targets {
            self.wake_task(entity, ability, task_index, wake.clone());
        }
    }

    fn tag_path(&self, tag: TagId) -> String {
        self.registry.resolve(tag).unwrap_or("?").to_string()
    }
}
