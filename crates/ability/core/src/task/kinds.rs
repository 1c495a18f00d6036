//! Built-in task kinds.
//!
//! Ability plans are data: a list of [`TaskKind`] values that the scheduler
//! instantiates at activation. Keeping the vocabulary closed keeps specs
//! serializable and replays deterministic.

use gameplay_tags::TagId;

use crate::task::{Task, TaskCtx, TaskFault, TaskProgress, TaskWake};

/// Blueprint for one task in an ability plan.
#[derive(Clone, Copy, Debug, PartialEq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum TaskKind {
    /// Completes during activation. Useful for fire-and-forget abilities
    /// that only exist to apply their activation tags.
    Instant,
    /// Completes once `seconds` of tick time have accumulated.
    WaitDuration { seconds: f32 },
    /// Completes after the owner has been ticked `ticks` times.
    WaitTicks { ticks: u64 },
    /// Suspends until a gameplay event with exactly `tag` arrives.
    WaitEvent { tag: TagId },
    /// Suspends until `tag` appears on the owner. Completes immediately if
    /// the owner already has it.
    WaitTagAdded { tag: TagId },
    /// Suspends until `tag` leaves the owner. Completes immediately if the
    /// owner does not have it.
    WaitTagRemoved { tag: TagId },
    /// Grants one stack of `tag` after `ticks` ticks (zero grants during
    /// activation), then completes. The stack outlives the ability.
    GrantTagAfter { tag: TagId, ticks: u64 },
    /// Releases one stack of `tag` after `ticks` ticks, then completes.
    RevokeTagAfter { tag: TagId, ticks: u64 },
}

impl TaskKind {
    pub(crate) fn instantiate(self) -> Box<dyn Task> {
        match self {
            TaskKind::Instant => Box::new(InstantTask),
            TaskKind::WaitDuration { seconds } => Box::new(WaitDurationTask {
                seconds,
                elapsed: 0.0,
            }),
            TaskKind::WaitTicks { ticks } => Box::new(WaitTicksTask { remaining: ticks }),
            TaskKind::WaitEvent { tag } => Box::new(WaitEventTask { tag }),
            TaskKind::WaitTagAdded { tag } => Box::new(WaitTagAddedTask { tag }),
            TaskKind::WaitTagRemoved { tag } => Box::new(WaitTagRemovedTask { tag }),
            TaskKind::GrantTagAfter { tag, ticks } => Box::new(GrantTagAfterTask {
                tag,
                remaining: ticks,
            }),
            TaskKind::RevokeTagAfter { tag, ticks } => Box::new(RevokeTagAfterTask {
                tag,
                remaining: ticks,
            }),
        }
    }
}

struct InstantTask;

impl Task for InstantTask {
    fn name(&self) -> &'static str {
        "instant"
    }

    fn activate(&mut self, _ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        Ok(TaskProgress::Complete)
    }
}

struct WaitDurationTask {
    seconds: f32,
    elapsed: f32,
}

impl Task for WaitDurationTask {
    fn name(&self) -> &'static str {
        "wait_duration"
    }

    fn activate(&mut self, _ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        if self.seconds <= 0.0 {
            Ok(TaskProgress::Complete)
        } else {
            Ok(TaskProgress::Continue)
        }
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        self.elapsed += ctx.dt;
        if self.elapsed >= self.seconds {
            Ok(TaskProgress::Complete)
        } else {
            Ok(TaskProgress::Continue)
        }
    }
}

struct WaitTicksTask {
    remaining: u64,
}

impl Task for WaitTicksTask {
    fn name(&self) -> &'static str {
        "wait_ticks"
    }

    fn activate(&mut self, _ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        if self.remaining == 0 {
            Ok(TaskProgress::Complete)
        } else {
            Ok(TaskProgress::Continue)
        }
    }

    fn tick(&mut self, _ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            Ok(TaskProgress::Complete)
        } else {
            Ok(TaskProgress::Continue)
        }
    }
}

struct WaitEventTask {
    tag: TagId,
}

impl Task for WaitEventTask {
    fn name(&self) -> &'static str {
        "wait_event"
    }

    fn activate(&mut self, ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        ctx.subscribe_event(self.tag);
        Ok(TaskProgress::Suspend)
    }

    fn on_event(
        &mut self,
        _ctx: &mut TaskCtx<'_>,
        wake: &TaskWake,
    ) -> Result<TaskProgress, TaskFault> {
        match wake {
            TaskWake::Event(event) if event.tag == self.tag => Ok(TaskProgress::Complete),
            _ => Ok(TaskProgress::Suspend),
        }
    }
}

struct WaitTagAddedTask {
    tag: TagId,
}

impl Task for WaitTagAddedTask {
    fn name(&self) -> &'static str {
        "wait_tag_added"
    }

    fn activate(&mut self, ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        if ctx.tags.has_exact(self.tag) {
            return Ok(TaskProgress::Complete);
        }
        ctx.subscribe_tag_added(self.tag);
        Ok(TaskProgress::Suspend)
    }

    fn on_event(
        &mut self,
        _ctx: &mut TaskCtx<'_>,
        wake: &TaskWake,
    ) -> Result<TaskProgress, TaskFault> {
        match wake {
            TaskWake::TagAdded(tag) if *tag == self.tag => Ok(TaskProgress::Complete),
            _ => Ok(TaskProgress::Suspend),
        }
    }
}

struct WaitTagRemovedTask {
    tag: TagId,
}

impl Task for WaitTagRemovedTask {
    fn name(&self) -> &'static str {
        "wait_tag_removed"
    }

    fn activate(&mut self, ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        if !ctx.tags.has_exact(self.tag) {
            return Ok(TaskProgress::Complete);
        }
        ctx.subscribe_tag_removed(self.tag);
        Ok(TaskProgress::Suspend)
    }

    fn on_event(
        &mut self,
        _ctx: &mut TaskCtx<'_>,
        wake: &TaskWake,
    ) -> Result<TaskProgress, TaskFault> {
        match wake {
            TaskWake::TagRemoved(tag) if *tag == self.tag => Ok(TaskProgress::Complete),
            _ => Ok(TaskProgress::Suspend),
        }
    }
}

struct GrantTagAfterTask {
    tag: TagId,
    remaining: u64,
}

impl Task for GrantTagAfterTask {
    fn name(&self) -> &'static str {
        "grant_tag_after"
    }

    fn activate(&mut self, ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        if self.remaining == 0 {
            ctx.grant_tag(self.tag);
            return Ok(TaskProgress::Complete);
        }
        Ok(TaskProgress::Continue)
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            ctx.grant_tag(self.tag);
            return Ok(TaskProgress::Complete);
        }
        Ok(TaskProgress::Continue)
    }
}

struct RevokeTagAfterTask {
    tag: TagId,
    remaining: u64,
}

impl Task for RevokeTagAfterTask {
    fn name(&self) -> &'static str {
        "revoke_tag_after"
    }

    fn activate(&mut self, ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        if self.remaining == 0 {
            ctx.revoke_tag(self.tag);
            return Ok(TaskProgress::Complete);
        }
        Ok(TaskProgress::Continue)
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            ctx.revoke_tag(self.tag);
            return Ok(TaskProgress::Complete);
        }
        Ok(TaskProgress::Continue)
    }
}
