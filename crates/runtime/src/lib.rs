//! Async host driver for the ability framework.
//!
//! `ability-core` is deliberately synchronous and single-threaded; this crate
//! puts the concurrency shell around it. A single worker task owns the
//! [`ability_core::AbilityScheduler`], commands arrive through a channel from
//! any number of [`SchedulerHandle`] clones, and scheduler events fan out over
//! a topic-based broadcast bus.
//!
//! Layout:
//! - [`runtime`] assembles the pieces and owns the worker's join handle
//! - [`api`] holds the caller-facing handle and error types
//! - [`events`] fans scheduler events out by topic
//! - [`workers`] is crate-private; the simulation loop lives there

pub mod api;
pub mod events;
pub mod runtime;

mod workers;

pub use api::{Result, RuntimeError, SchedulerHandle};
pub use events::{EventBus, Topic};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
