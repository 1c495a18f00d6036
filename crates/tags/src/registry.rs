//! Interned tag registry with precomputed ancestor chains.
//!
//! Tags are dotted paths (`Status.Debuff.Stunned`). Registering a path
//! interns it and every prefix of it, so `Status` and `Status.Debuff` exist
//! as soon as the full path does. Each node stores its ancestor chain at
//! registration time, which keeps `is_child_of` at O(depth) array scans and
//! lets containers build their closure without walking the tree.
//!
//! # Design
//!
//! Nodes live in an arena indexed by [`TagId`]; parent/child links are ids,
//! never references, so the hierarchy is acyclic by construction and the
//! registry can be shared freely (typically behind an `Arc`) once the
//! vocabulary is frozen.

use std::collections::HashMap;
use std::fmt;

use arrayvec::ArrayVec;

use crate::error::TagError;

/// Interned handle for a registered tag path.
///
/// Two equal paths always intern to the same id, and the id-to-path mapping
/// is stable for the registry's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagId(pub u32);

impl TagId {
    /// Arena index of this tag.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag#{}", self.0)
    }
}

/// One interned tag: its full path, parent link, and precomputed lineage.
#[derive(Clone, Debug)]
struct TagNode {
    path: String,
    parent: Option<TagId>,
    /// Ancestors from root to parent, excluding the node itself.
    ancestors: ArrayVec<TagId, { TagRegistry::MAX_DEPTH }>,
    children: Vec<TagId>,
}

/// Arena of interned tag nodes plus the path index.
#[derive(Clone, Debug, Default)]
pub struct TagRegistry {
    nodes: Vec<TagNode>,
    by_path: HashMap<String, TagId>,
}

impl TagRegistry {
    /// Maximum number of segments in a tag path.
    pub const MAX_DEPTH: usize = 8;

    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `path`, creating any missing prefixes along the way.
    ///
    /// Idempotent: re-registering an existing path returns the same id.
    /// On failure the registry is unchanged.
    pub fn register(&mut self, path: &str) -> Result<TagId, TagError> {
        if let Some(&id) = self.by_path.get(path) {
            return Ok(id);
        }
        Self::validate(path)?;

        let mut current: Option<TagId> = None;
        let mut end = 0usize;
        for segment in path.split('.') {
            end = if end == 0 {
                segment.len()
            } else {
                end + 1 + segment.len()
            };
            let prefix = &path[..end];
            let id = match self.by_path.get(prefix) {
                Some(&id) => id,
                None => self.insert_node(prefix, current),
            };
            current = Some(id);
        }

        // Unreachable after validation (at least one segment exists), but
        // kept as an error path rather than a panic.
        current.ok_or_else(|| TagError::InvalidTagFormat {
            path: path.to_string(),
            reason: "path is empty",
        })
    }

    /// Looks up an already-registered path.
    pub fn find(&self, path: &str) -> Option<TagId> {
        self.by_path.get(path).copied()
    }

    /// Like [`find`](Self::find) but failing with [`TagError::UnknownTag`].
    pub fn require(&self, path: &str) -> Result<TagId, TagError> {
        self.find(path).ok_or_else(|| TagError::UnknownTag {
            path: path.to_string(),
        })
    }

    /// Returns the canonical path for `id`, if `id` came from this registry.
    pub fn resolve(&self, id: TagId) -> Option<&str> {
        self.nodes.get(id.index()).map(|node| node.path.as_str())
    }

    /// True iff `ancestor` appears in `tag`'s lineage.
    ///
    /// `Status.Debuff.Stunned` is a child of `Status.Debuff` and of
    /// `Status`; no tag is a child of itself.
    pub fn is_child_of(&self, tag: TagId, ancestor: TagId) -> bool {
        match self.nodes.get(tag.index()) {
            Some(node) => node.ancestors.contains(&ancestor),
            None => false,
        }
    }

    /// Direct parent of `id`, or `None` for roots and unknown ids.
    pub fn parent(&self, id: TagId) -> Option<TagId> {
        self.nodes.get(id.index()).and_then(|node| node.parent)
    }

    /// Full lineage of `id` from root to parent, excluding `id` itself.
    pub fn ancestors(&self, id: TagId) -> &[TagId] {
        self.nodes
            .get(id.index())
            .map(|node| node.ancestors.as_slice())
            .unwrap_or(&[])
    }

    /// Direct children of `id` in registration order.
    pub fn children(&self, id: TagId) -> &[TagId] {
        self.nodes
            .get(id.index())
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Number of segments in `id`'s path (1 for roots, 0 for unknown ids).
    pub fn depth(&self, id: TagId) -> usize {
        self.nodes
            .get(id.index())
            .map(|node| node.ancestors.len() + 1)
            .unwrap_or(0)
    }

    /// Number of interned tags, implicit prefixes included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates all interned tags in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TagId, &str)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (TagId(index as u32), node.path.as_str()))
    }

    /// Iterates root tags (presentation entry points for tree browsing).
    pub fn roots(&self) -> impl Iterator<Item = TagId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(index, _)| TagId(index as u32))
    }

    fn validate(path: &str) -> Result<(), TagError> {
        if path.is_empty() {
            return Err(TagError::InvalidTagFormat {
                path: path.to_string(),
                reason: "path is empty",
            });
        }
        let mut depth = 0usize;
        for segment in path.split('.') {
            if segment.is_empty() {
                return Err(TagError::InvalidTagFormat {
                    path: path.to_string(),
                    reason: "empty segment",
                });
            }
            depth += 1;
        }
        if depth > Self::MAX_DEPTH {
            return Err(TagError::DepthExceeded {
                path: path.to_string(),
                max_depth: Self::MAX_DEPTH,
            });
        }
        Ok(())
    }

    fn insert_node(&mut self, path: &str, parent: Option<TagId>) -> TagId {
        let id = TagId(self.nodes.len() as u32);
        let mut ancestors = ArrayVec::new();
        if let Some(parent_id) = parent {
            ancestors = self.nodes[parent_id.index()].ancestors.clone();
            ancestors.push(parent_id);
            self.nodes[parent_id.index()].children.push(id);
        }
        self.nodes.push(TagNode {
            path: path.to_string(),
            parent,
            ancestors,
            children: Vec::new(),
        });
        self.by_path.insert(path.to_string(), id);
        id
    }
}
