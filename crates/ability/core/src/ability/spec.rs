//! Static ability definitions.
//!
//! A spec is pure data registered once with the scheduler. All tag fields
//! hold interned ids, so gate checks at activation never touch strings.

use gameplay_tags::{TagContainer, TagId};
use thiserror::Error;

use crate::config::AbilityConfig;
use crate::error::{ErrorSeverity, FrameworkError};
use crate::task::TaskKind;

/// Index of a registered [`AbilitySpec`] within its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpecHandle(pub u32);

impl SpecHandle {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SpecHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "spec#{}", self.0)
    }
}

/// When an ability instance ends on its own.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CompletionPolicy {
    /// Ends with a completed outcome once every spawned task is terminal.
    #[default]
    DrainTasks,
    /// Runs until ended explicitly (or cancelled by a cascade).
    Explicit,
}

/// Static definition of an ability: identity, gates, tag effects, and the
/// task plan its instances execute.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbilitySpec {
    /// Human-readable name for events and logs.
    pub name: String,
    /// Tags describing what this ability *is*, e.g. `Ability.Attack.Heavy`.
    /// Matched hierarchically by cancel and block relationships.
    pub ability_tags: Vec<TagId>,
    /// Activation fails while the owner has any of these (hierarchical).
    pub blocked_by_tags: Vec<TagId>,
    /// Activation fails unless the owner has all of these (hierarchical).
    pub required_tags: Vec<TagId>,
    /// Granted to the owner while an instance is live, released on end.
    pub activation_owned_tags: Vec<TagId>,
    /// A live instance cancels when any of these appears on the owner.
    pub cancel_on_tags: Vec<TagId>,
    /// Activating cancels live abilities whose identity matches any of these.
    pub cancels_abilities_with: Vec<TagId>,
    /// While live, abilities whose identity matches any of these cannot
    /// activate.
    pub blocks_abilities_with: Vec<TagId>,
    /// Ticks after activation before this spec can activate again on the
    /// same owner. Zero disables the cooldown gate.
    pub cooldown_ticks: u64,
    /// Tasks spawned at activation, in order.
    pub plan: Vec<TaskKind>,
    pub completion: CompletionPolicy,
}

impl AbilitySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ability_tags: Vec::new(),
            blocked_by_tags: Vec::new(),
            required_tags: Vec::new(),
            activation_owned_tags: Vec::new(),
            cancel_on_tags: Vec::new(),
            cancels_abilities_with: Vec::new(),
            blocks_abilities_with: Vec::new(),
            cooldown_ticks: 0,
            plan: Vec::new(),
            completion: CompletionPolicy::DrainTasks,
        }
    }

    pub fn with_ability_tags(mut self, tags: impl Into<Vec<TagId>>) -> Self {
        self.ability_tags = tags.into();
        self
    }

    pub fn with_blocked_by(mut self, tags: impl Into<Vec<TagId>>) -> Self {
        self.blocked_by_tags = tags.into();
        self
    }

    pub fn with_required(mut self, tags: impl Into<Vec<TagId>>) -> Self {
        self.required_tags = tags.into();
        self
    }

    pub fn with_owned(mut self, tags: impl Into<Vec<TagId>>) -> Self {
        self.activation_owned_tags = tags.into();
        self
    }

    pub fn with_cancel_on(mut self, tags: impl Into<Vec<TagId>>) -> Self {
        self.cancel_on_tags = tags.into();
        self
    }

    pub fn with_cancels_abilities(mut self, tags: impl Into<Vec<TagId>>) -> Self {
        self.cancels_abilities_with = tags.into();
        self
    }

    pub fn with_blocks_abilities(mut self, tags: impl Into<Vec<TagId>>) -> Self {
        self.blocks_abilities_with = tags.into();
        self
    }

    pub fn with_cooldown(mut self, ticks: u64) -> Self {
        self.cooldown_ticks = ticks;
        self
    }

    pub fn with_plan(mut self, plan: impl Into<Vec<TaskKind>>) -> Self {
        self.plan = plan.into();
        self
    }

    pub fn with_completion(mut self, completion: CompletionPolicy) -> Self {
        self.completion = completion;
        self
    }

    /// First blocked-by tag the owner currently matches, if any.
    pub fn blocking_tag_in(&self, owner_tags: &TagContainer) -> Option<TagId> {
        owner_tags.first_match(&self.blocked_by_tags)
    }

    /// First required tag the owner is missing, if any.
    pub fn missing_required_in(&self, owner_tags: &TagContainer) -> Option<TagId> {
        owner_tags.first_miss(&self.required_tags)
    }
}

/// Spec rejected at registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpecError {
    /// The plan spawns more tasks than an instance can hold.
    #[error("plan has {len} tasks, limit is {max}")]
    PlanTooLong { len: usize, max: usize },
}

impl SpecError {
    pub(crate) fn plan_too_long(len: usize) -> Self {
        SpecError::PlanTooLong {
            len,
            max: AbilityConfig::MAX_TASKS_PER_ABILITY,
        }
    }
}

impl FrameworkError for SpecError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            SpecError::PlanTooLong { .. } => "SPEC_PLAN_TOO_LONG",
        }
    }
}
