//! Types handed to runtime consumers.
//!
//! Everything a caller holds lives here, so the orchestration and worker
//! layers stay free of public surface.

pub mod errors;
pub mod handle;

pub use errors::{Result, RuntimeError};
pub use handle::SchedulerHandle;
