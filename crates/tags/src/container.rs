//! Tag sets attached to entities, with exact and hierarchical matching.
//!
//! A container tracks its explicit members plus a counted closure of every
//! member's ancestors. The closure makes the per-frame query direction (does
//! this entity carry anything under `Status.Debuff`?) a single hash lookup
//! instead of a lineage walk, at the cost of keeping counts in sync on every
//! add and remove.

use std::collections::{HashMap, HashSet};

use crate::registry::{TagId, TagRegistry};

/// Owned set of tags attached to one entity.
///
/// Mutation requires the registry (to maintain the ancestor closure);
/// queries do not.
#[derive(Clone, Debug, Default)]
pub struct TagContainer {
    members: HashSet<TagId>,
    /// Members and all their ancestors, counted by how many members
    /// contribute each entry.
    closure: HashMap<TagId, u32>,
}

impl TagContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a container from a set of member tags.
    pub fn from_tags(registry: &TagRegistry, tags: &[TagId]) -> Self {
        let mut container = Self::new();
        for &tag in tags {
            container.add(registry, tag);
        }
        container
    }

    /// Number of explicit members (ancestors in the closure do not count).
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterates explicit members in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = TagId> + '_ {
        self.members.iter().copied()
    }

    /// Inserts `tag` as an explicit member. Returns true if it was new.
    pub fn add(&mut self, registry: &TagRegistry, tag: TagId) -> bool {
        if !self.members.insert(tag) {
            return false;
        }
        *self.closure.entry(tag).or_insert(0) += 1;
        for &ancestor in registry.ancestors(tag) {
            *self.closure.entry(ancestor).or_insert(0) += 1;
        }
        true
    }

    /// Removes the explicit member `tag`. Returns true if it was present.
    pub fn remove(&mut self, registry: &TagRegistry, tag: TagId) -> bool {
        if !self.members.remove(&tag) {
            return false;
        }
        self.release(tag);
        for &ancestor in registry.ancestors(tag) {
            self.release(ancestor);
        }
        true
    }

    /// Exact membership: true iff `tag` itself was added.
    pub fn has_exact(&self, tag: TagId) -> bool {
        self.members.contains(&tag)
    }

    /// True iff at least one of `tags` is literally a member.
    pub fn has_any_exact(&self, tags: &[TagId]) -> bool {
        tags.iter().any(|tag| self.has_exact(*tag))
    }

    /// True iff every one of `tags` is literally a member.
    pub fn has_all_exact(&self, tags: &[TagId]) -> bool {
        tags.iter().all(|tag| self.has_exact(*tag))
    }

    /// Hierarchical match: true iff some member equals `query` or descends
    /// from it. A container holding `Status.Debuff.Stunned` matches the
    /// query `Status.Debuff`; the reverse direction does not match.
    pub fn matches_tag(&self, query: TagId) -> bool {
        self.closure.contains_key(&query)
    }

    /// True iff at least one query tag hierarchically matches some member.
    /// An empty query set matches nothing.
    pub fn matches_any(&self, queries: &[TagId]) -> bool {
        queries.iter().any(|query| self.matches_tag(*query))
    }

    /// True iff every query tag hierarchically matches some member.
    /// An empty query set is vacuously satisfied.
    pub fn matches_all(&self, queries: &[TagId]) -> bool {
        queries.iter().all(|query| self.matches_tag(*query))
    }

    /// First query tag that hierarchically matches, if any. Used by gating
    /// to report which tag tripped a block.
    pub fn first_match(&self, queries: &[TagId]) -> Option<TagId> {
        queries.iter().copied().find(|&query| self.matches_tag(query))
    }

    /// First query tag that does NOT hierarchically match, if any. Used by
    /// gating to report which required tag is missing.
    pub fn first_miss(&self, queries: &[TagId]) -> Option<TagId> {
        queries.iter().copied().find(|&query| !self.matches_tag(query))
    }

    fn release(&mut self, tag: TagId) {
        if let Some(count) = self.closure.get_mut(&tag) {
            *count -= 1;
            if *count == 0 {
                self.closure.remove(&tag);
            }
        }
    }
}
