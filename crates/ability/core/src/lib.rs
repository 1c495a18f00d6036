//! Deterministic ability and task state machines.
//!
//! This crate drives gameplay abilities for a set of entities: activation
//! gating against hierarchical tags, cooperative async-style tasks, cascade
//! cancellation, synchronous tag interrupts, and client-prediction
//! reconciliation.
//!
//! # Design
//! - Everything here is synchronous and deterministic. One [`AbilityScheduler`]
//!   owns the world it mutates; callers hand it commands and it hands back
//!   [`AbilityEvent`]s describing what changed.
//! - Tasks are cooperative: the scheduler calls into them, they return a
//!   progress verdict and queue side-effect requests. Tasks never hold locks
//!   or spawn threads.
//! - Abilities and tasks retire eagerly. Terminal instances are removed from
//!   the bookkeeping maps the moment they end, so stale ids simply miss.

pub mod ability;
pub mod config;
pub mod env;
pub mod error;
pub mod ids;
pub mod scheduler;
pub mod task;

pub use ability::{
    AbilityInstance, AbilitySpec, AbilityState, ActivationError, AuthorityMode, CompletionPolicy,
    EndReason, SpecError, SpecHandle,
};
pub use config::AbilityConfig;
pub use env::{AbilityEnv, AuthorityOracle};
pub use error::{ErrorSeverity, FrameworkError};
pub use ids::{AbilityId, EntityId, Tick};
pub use scheduler::{
    AbilityEvent, AbilityScheduler, AbilitySnapshot, EntitySnapshot, SchedulerError, TaskSnapshot,
};
pub use task::{
    GameplayEvent, Task, TaskCtx, TaskError, TaskFault, TaskKind, TaskOutcome, TaskProgress,
    TaskRequest, TaskSlot, TaskState, TaskWake,
};
