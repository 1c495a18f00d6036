//! Slot wrapper that enforces the task lifecycle.
//!
//! The slot is the fault boundary: all calls into the boxed task go through
//! it, it rejects calls that do not match the current state, and it converts
//! `Err(TaskFault)` into a cancelled outcome instead of propagating.

use std::fmt;

use crate::task::{Task, TaskCtx, TaskError, TaskFault, TaskProgress, TaskState, TaskWake};

/// Terminal result of a task, reported exactly once.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TaskOutcome {
    Completed,
    Cancelled,
}

/// One spawned task plus its lifecycle state.
pub struct TaskSlot {
    task: Box<dyn Task>,
    state: TaskState,
    fault: Option<TaskFault>,
}

impl fmt::Debug for TaskSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSlot")
            .field("task", &self.task.name())
            .field("state", &self.state)
            .field("fault", &self.fault)
            .finish()
    }
}

impl TaskSlot {
    pub fn new(task: Box<dyn Task>) -> Self {
        Self {
            task,
            state: TaskState::Pending,
            fault: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn name(&self) -> &'static str {
        self.task.name()
    }

    /// Fault that cancelled this task, if any.
    pub fn fault(&self) -> Option<&TaskFault> {
        self.fault.as_ref()
    }

    /// Runs the activate callback. Errors unless the slot is still pending.
    ///
    /// Returns the terminal outcome if the task finished during activation.
    pub fn activate(&mut self, ctx: &mut TaskCtx<'_>) -> Result<Option<TaskOutcome>, TaskError> {
        if self.state != TaskState::Pending {
            return Err(TaskError::InvalidTaskState {
                operation: "activate",
                state: self.state,
            });
        }
        self.state = TaskState::Active;
        let progress = self.task.activate(ctx);
        Ok(self.settle(progress))
    }

    /// Advances an active task by one tick. Parked and terminal slots are
    /// left untouched.
    pub fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Option<TaskOutcome> {
        if self.state != TaskState::Active {
            return None;
        }
        let progress = self.task.tick(ctx);
        self.settle(progress)
    }

    /// Delivers a wake to a suspended task.
    pub fn deliver(&mut self, ctx: &mut TaskCtx<'_>, wake: &TaskWake) -> Option<TaskOutcome> {
        if self.state != TaskState::Suspended {
            return None;
        }
        let progress = self.task.on_event(ctx, wake);
        self.settle(progress)
    }

    /// Cancels the task, releasing its resources synchronously.
    ///
    /// Returns true if this call performed the cancellation; false if the
    /// slot was already terminal. After a true return no callback on the
    /// task will ever run again.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.task.on_cancel();
        self.state = TaskState::Cancelled;
        true
    }

    fn settle(&mut self, progress: Result<TaskProgress, TaskFault>) -> Option<TaskOutcome> {
        match progress {
            Ok(TaskProgress::Continue) => {
                self.state = TaskState::Active;
                None
            }
            Ok(TaskProgress::Suspend) => {
                self.state = TaskState::Suspended;
                None
            }
            Ok(TaskProgress::Complete) => {
                self.state = TaskState::Completed;
                Some(TaskOutcome::Completed)
            }
            Err(fault) => {
                self.fault = Some(fault);
                self.state = TaskState::Cancelled;
                Some(TaskOutcome::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Tick;
    use gameplay_tags::TagContainer;

    struct Script {
        verdicts: Vec<Result<TaskProgress, TaskFault>>,
        cancelled: bool,
    }

    impl Script {
        fn new(verdicts: Vec<Result<TaskProgress, TaskFault>>) -> Self {
            Self {
                verdicts,
                cancelled: false,
            }
        }

        fn next(&mut self) -> Result<TaskProgress, TaskFault> {
            if self.verdicts.is_empty() {
                Ok(TaskProgress::Continue)
            } else {
                self.verdicts.remove(0)
            }
        }
    }

    impl Task for Script {
        fn name(&self) -> &'static str {
            "script"
        }

        fn activate(&mut self, _ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
            self.next()
        }

        fn tick(&mut self, _ctx: &mut TaskCtx<'_>) -> Result<TaskProgress, TaskFault> {
            self.next()
        }

        fn on_event(
            &mut self,
            _ctx: &mut TaskCtx<'_>,
            _wake: &TaskWake,
        ) -> Result<TaskProgress, TaskFault> {
            self.next()
        }

        fn on_cancel(&mut self) {
            self.cancelled = true;
        }
    }

    fn ctx_parts() -> (TagContainer, Vec<crate::task::TaskRequest>) {
        (TagContainer::new(), Vec::new())
    }

    #[test]
    fn activate_twice_is_rejected() {
        let (tags, mut requests) = ctx_parts();
        let mut slot = TaskSlot::new(Box::new(Script::new(vec![Ok(TaskProgress::Continue)])));

        let mut ctx = TaskCtx::new(Tick(0), 0.0, &tags, &mut requests);
        assert_eq!(slot.activate(&mut ctx), Ok(None));
        assert_eq!(slot.state(), TaskState::Active);

        let mut ctx = TaskCtx::new(Tick(0), 0.0, &tags, &mut requests);
        assert_eq!(
            slot.activate(&mut ctx),
            Err(TaskError::InvalidTaskState {
                operation: "activate",
                state: TaskState::Active,
            })
        );
    }

    #[test]
    fn fault_cancels_and_records_reason() {
        let (tags, mut requests) = ctx_parts();
        let mut slot = TaskSlot::new(Box::new(Script::new(vec![
            Ok(TaskProgress::Continue),
            Err(TaskFault::new("index out of range")),
        ])));

        let mut ctx = TaskCtx::new(Tick(0), 0.0, &tags, &mut requests);
        assert_eq!(slot.activate(&mut ctx), Ok(None));

        let mut ctx = TaskCtx::new(Tick(1), 0.1, &tags, &mut requests);
        assert_eq!(slot.tick(&mut ctx), Some(TaskOutcome::Cancelled));
        assert_eq!(slot.state(), TaskState::Cancelled);
        assert_eq!(slot.fault().map(|f| f.reason.as_str()), Some("index out of range"));
    }

    #[test]
    fn terminal_slot_ignores_further_calls() {
        let (tags, mut requests) = ctx_parts();
        let mut slot = TaskSlot::new(Box::new(Script::new(vec![Ok(TaskProgress::Complete)])));

        let mut ctx = TaskCtx::new(Tick(0), 0.0, &tags, &mut requests);
        assert_eq!(
            slot.activate(&mut ctx).unwrap(),
            Some(TaskOutcome::Completed)
        );

        let mut ctx = TaskCtx::new(Tick(1), 0.1, &tags, &mut requests);
        assert_eq!(slot.tick(&mut ctx), None);
        assert!(!slot.cancel());
        assert_eq!(slot.state(), TaskState::Completed);
    }

    #[test]
    fn cancel_runs_release_hook_once() {
        let (tags, mut requests) = ctx_parts();
        let mut slot = TaskSlot::new(Box::new(Script::new(vec![Ok(TaskProgress::Suspend)])));

        let mut ctx = TaskCtx::new(Tick(0), 0.0, &tags, &mut requests);
        assert_eq!(slot.activate(&mut ctx), Ok(None));
        assert_eq!(slot.state(), TaskState::Suspended);

        assert!(slot.cancel());
        assert!(!slot.cancel());
        assert_eq!(slot.state(), TaskState::Cancelled);

        // No wake reaches the task after cancellation.
        let mut ctx = TaskCtx::new(Tick(1), 0.0, &tags, &mut requests);
        let wake = TaskWake::TagAdded(gameplay_tags::TagId(0));
        assert_eq!(slot.deliver(&mut ctx, &wake), None);
    }

    #[test]
    fn suspended_task_resumes_through_wake() {
        let (tags, mut requests) = ctx_parts();
        let mut slot = TaskSlot::new(Box::new(Script::new(vec![
            Ok(TaskProgress::Suspend),
            Ok(TaskProgress::Continue),
        ])));

        let mut ctx = TaskCtx::new(Tick(0), 0.0, &tags, &mut requests);
        assert_eq!(slot.activate(&mut ctx), Ok(None));

        // Suspended slots are not ticked.
        let mut ctx = TaskCtx::new(Tick(1), 0.1, &tags, &mut requests);
        assert_eq!(slot.tick(&mut ctx), None);

        let mut ctx = TaskCtx::new(Tick(2), 0.0, &tags, &mut requests);
        let wake = TaskWake::TagAdded(gameplay_tags::TagId(0));
        assert_eq!(slot.deliver(&mut ctx, &wake), None);
        assert_eq!(slot.state(), TaskState::Active);
    }
}
