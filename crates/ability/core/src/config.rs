//! Scheduler configuration and compile-time capacity limits.

/// Tunable limits for the ability scheduler.
///
/// Associated constants are compile-time capacities baked into stack-allocated
/// collections. Instance fields are runtime-tunable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbilityConfig {
    /// Hard cap on tag-interrupt passes drained per entry point.
    ///
    /// A grant/revoke feedback loop between tasks could otherwise spin
    /// forever inside a single tick. When the cap is hit the remaining
    /// notice queue is dropped.
    pub max_notice_passes: u32,
}

impl AbilityConfig {
    /// Maximum tasks a single ability plan may spawn.
    pub const MAX_TASKS_PER_ABILITY: usize = 16;

    pub const DEFAULT_MAX_NOTICE_PASSES: u32 = 64;

    pub const fn new() -> Self {
        Self {
            max_notice_passes: Self::DEFAULT_MAX_NOTICE_PASSES,
        }
    }

    pub const fn with_max_notice_passes(mut self, passes: u32) -> Self {
        self.max_notice_passes = passes;
        self
    }
}

impl Default for AbilityConfig {
    fn default() -> Self {
        Self::new()
    }
}
