//! Cooperative tasks: the async building blocks of an ability.
//!
//! # Design
//! Tasks are polled state machines driven by the scheduler, not futures.
//! Every callback receives a [`TaskCtx`] scoped to that single call: it
//! exposes the entity's visible tags read-only and records side-effect
//! requests. The scheduler applies the requests after the callback returns,
//! which keeps task code free of aliasing against the world it observes.
//!
//! A task signals lifecycle through [`TaskProgress`] return values. Faults
//! (`Err`) are absorbed at the slot boundary and cancel the task instead of
//! unwinding into the scheduler; see [`TaskSlot`].

pub mod error;
pub mod kinds;
pub mod slot;

pub use error::{TaskError, TaskFault};
pub use kinds::TaskKind;
pub use slot::{TaskOutcome, TaskSlot};

use gameplay_tags::{TagContainer, TagId};

use crate::ids::{EntityId, Tick};

// ============================================================================
// Lifecycle
// ============================================================================

/// Task lifecycle states.
///
/// `Pending` exists only between spawn and the activate call. `Completed`
/// and `Cancelled` are terminal; a slot in a terminal state never invokes
/// its task again.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TaskState {
    Pending,
    Active,
    Suspended,
    Completed,
    Cancelled,
}

impl TaskState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }
}

/// What a task wants after a callback returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskProgress {
    /// Keep ticking next frame.
    Continue,
    /// Park until a subscribed wake arrives. Suspended tasks are not ticked.
    Suspend,
    /// Done; the slot records a completed outcome.
    Complete,
}

// ============================================================================
// Wakes and requests
// ============================================================================

/// A gameplay event routed to an entity, e.g. a hit confirmation.
///
/// Events address tasks by exact tag; hierarchy does not apply here.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GameplayEvent {
    pub tag: TagId,
    pub magnitude: f32,
    pub instigator: Option<EntityId>,
}

impl GameplayEvent {
    pub fn new(tag: TagId) -> Self {
        Self {
            tag,
            magnitude: 0.0,
            instigator: None,
        }
    }

    pub fn with_magnitude(mut self, magnitude: f32) -> Self {
        self.magnitude = magnitude;
        self
    }

    pub fn with_instigator(mut self, instigator: EntityId) -> Self {
        self.instigator = Some(instigator);
        self
    }
}

/// Why a suspended task was woken.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskWake {
    /// A gameplay event the task subscribed to.
    Event(GameplayEvent),
    /// A tag the task watched appeared on the owner (exact match).
    TagAdded(TagId),
    /// A tag the task watched left the owner (exact match).
    TagRemoved(TagId),
}

/// Side effects a task asks the scheduler to perform on its behalf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskRequest {
    SubscribeEvent(TagId),
    SubscribeTagAdded(TagId),
    SubscribeTagRemoved(TagId),
    GrantTag(TagId),
    RevokeTag(TagId),
}

/// Per-callback view handed to a task.
///
/// Grants and revokes requested here are applied by the scheduler after the
/// callback returns, and any interrupts they trigger fire before control
/// returns to the caller that mutated the tag.
pub struct TaskCtx<'a> {
    /// Current simulation tick.
    pub clock: Tick,
    /// Seconds advanced by this tick; zero outside of tick callbacks.
    pub dt: f32,
    /// Owner's visible tags at the time of the callback.
    pub tags: &'a TagContainer,
    requests: &'a mut Vec<TaskRequest>,
}

impl<'a> TaskCtx<'a> {
    pub(crate) fn new(
        clock: Tick,
        dt: f32,
        tags: &'a TagContainer,
        requests: &'a mut Vec<TaskRequest>,
    ) -> Self {
        Self {
            clock,
            dt,
            tags,
            requests,
        }
    }

    /// Wake this task when a gameplay event carrying `tag` arrives.
    pub fn subscribe_event(&mut self, tag: TagId) {
        self.requests.push(TaskRequest::SubscribeEvent(tag));
    }

    /// Wake this task when `tag` is added to the owner.
    pub fn subscribe_tag_added(&mut self, tag: TagId) {
        self.requests.push(TaskRequest::SubscribeTagAdded(tag));
    }

    /// Wake this task when `tag` is removed from the owner.
    pub fn subscribe_tag_removed(&mut self, tag: TagId) {
        self.requests.push(TaskRequest::SubscribeTagRemoved(tag));
    }

    /// Grant one stack of `tag` on the owner once the callback returns.
    pub fn grant_tag(&mut self, tag: TagId) {
        self.requests.push(TaskRequest::GrantTag(tag));
    }

    /// Release one stack of `tag` on the owner once the callback returns.
    pub fn revoke_tag(&mut self, tag: TagId) {
        self.requests.push(TaskRequest::RevokeTag(tag));
    }
}

// ============================================================================
// Task trait
// ============================================================================

/// A cooperative unit of ability work.
///
/// Implementations return `Err(TaskFault)` for unrecoverable internal
/// failures; the slot cancels the task and reports the fault instead of
/// letting it poison the scheduler.
pub trait Task: Send {
    /// Stable name for events and logs.
    fn name(&self) -> &'static str;

    /// Called exactly once when the owning ability spawns the task.
    fn activate(&mut self, ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault>;

    /// Called every tick while the task is active.
    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        let _ = ctx;
        Ok(TaskProgress::Continue)
    }

    /// Called while suspended when a subscribed wake arrives.
    ///
    /// Returning `Suspend` keeps the task parked; `Continue` resumes
    /// ticking from the next frame.
    fn on_event(
        &mut self,
        ctx: &mut TaskCtx<'_>,
        wake: &TaskWake,
    ) -> Result<TaskProgress, TaskFault> {
        let _ = (ctx, wake);
        Ok(TaskProgress::Suspend)
    }

    /// Called once if the task is cancelled before completing.
    ///
    /// Must release external resources synchronously. No further callbacks
    /// follow.
    fn on_cancel(&mut self) {}
}
