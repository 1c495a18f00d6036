//! Host-provided collaborators the scheduler consults during activation.
//!
//! The scheduler never talks to the network or the session layer directly.
//! Hosts implement the oracle traits and pass an [`AbilityEnv`] into the
//! calls that need outside answers. Pure-local setups can pass
//! [`AbilityEnv::new`] and every activation runs authoritative.

use crate::ids::EntityId;

/// Answers whether an entity is running ahead of the server.
///
/// Implementations must be cheap; this is consulted on every activation.
pub trait AuthorityOracle {
    /// True when `entity` is locally controlled and not yet confirmed by
    /// the authority, so its activations start in a predicted state.
    fn is_locally_predicting(&self, entity: EntityId) -> bool;
}

/// Aggregates the oracles for one scheduler call.
///
/// Borrows keep the scheduler decoupled from host lifetimes: the env is
/// built on the stack per call and dropped immediately after.
#[derive(Clone, Copy, Default)]
pub struct AbilityEnv<'a> {
    authority: Option<&'a dyn AuthorityOracle>,
}

impl<'a> AbilityEnv<'a> {
    /// Env with no oracles attached; all activations are authoritative.
    pub fn new() -> Self {
        Self { authority: None }
    }

    pub fn with_authority(mut self, oracle: &'a dyn AuthorityOracle) -> Self {
        self.authority = Some(oracle);
        self
    }

    pub fn is_locally_predicting(&self, entity: EntityId) -> bool {
        self.authority
            .map_or(false, |oracle| oracle.is_locally_predicting(entity))
    }
}
