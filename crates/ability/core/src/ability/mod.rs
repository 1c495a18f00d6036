//! Ability definitions and live instances.

pub mod error;
pub mod instance;
pub mod spec;

pub use error::ActivationError;
pub use instance::{AbilityInstance, AbilityState, AuthorityMode, EndReason};
pub use spec::{AbilitySpec, CompletionPolicy, SpecError, SpecHandle};
