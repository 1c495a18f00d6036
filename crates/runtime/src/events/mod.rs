//! Topic-based event bus for scheduler events.
//!
//! The scheduler emits a single flat event stream; the bus splits it into
//! topics so consumers subscribe only to what they need.

mod bus;

pub use bus::{EventBus, Topic};
