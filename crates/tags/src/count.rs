//! Counted tag grants.
//!
//! Gameplay systems frequently stack the same tag from independent sources:
//! two active abilities may both apply `State.Busy`, and the tag must stay
//! visible until the last grant is released. [`TagCountContainer`] keeps a
//! count per tag and exposes a plain [`TagContainer`] view of the tags whose
//! count is nonzero. Grant and revoke report visibility *edges* so callers
//! can fire interrupt evaluation only when a tag actually appears or
//! disappears.

use std::collections::HashMap;

use crate::container::TagContainer;
use crate::registry::{TagId, TagRegistry};

/// Tag set with counted grants layered over a visible [`TagContainer`].
#[derive(Clone, Debug, Default)]
pub struct TagCountContainer {
    counts: HashMap<TagId, u32>,
    visible: TagContainer,
}

impl TagCountContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one grant of `tag`. Returns true iff the tag became visible
    /// (count went 0 -> 1).
    pub fn grant(&mut self, registry: &TagRegistry, tag: TagId) -> bool {
        let count = self.counts.entry(tag).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.visible.add(registry, tag);
            true
        } else {
            false
        }
    }

    /// Releases one grant of `tag`. Returns true iff the tag became hidden
    /// (count went 1 -> 0). Revoking a tag with no grants is a no-op.
    pub fn revoke(&mut self, registry: &TagRegistry, tag: TagId) -> bool {
        let Some(count) = self.counts.get_mut(&tag) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(&tag);
            self.visible.remove(registry, tag);
            true
        } else {
            false
        }
    }

    /// Current grant count for `tag`.
    pub fn count(&self, tag: TagId) -> u32 {
        self.counts.get(&tag).copied().unwrap_or(0)
    }

    /// The tags with at least one grant, as a matchable container.
    pub fn visible(&self) -> &TagContainer {
        &self.visible
    }
}
