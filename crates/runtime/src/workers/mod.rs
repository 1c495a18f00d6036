//! Background tasks spawned by the runtime.
//!
//! The simulation worker serializes all scheduler access; nothing else in
//! the process touches mutable ability state.

mod simulation;

pub use simulation::{Command, SimulationWorker};
