//! Expression-tree queries over tag containers.
//!
//! A [`TagQuery`] composes the three leaf matches (any / all / none of a tag
//! set) with the three combinators over sub-expressions, which is enough to
//! express requirements like "(Stunned or Rooted) and not Immune" as data.
//! Queries are plain values: authoring tools can build and serialize them,
//! and evaluation needs only the container (hierarchy is baked into the
//! container's closure).

use crate::container::TagContainer;
use crate::registry::TagId;

/// Composable tag-set predicate evaluated against a [`TagContainer`].
///
/// Leaf semantics follow the container's hierarchical matching: a query tag
/// matches any member equal to or more specific than it. Empty leaves keep
/// the container conventions (`any([])` is false, `all([])` is true, so
/// `none([])` is vacuously true as well).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TagQuery {
    /// At least one tag matches.
    AnyTagsMatch(Vec<TagId>),
    /// Every tag matches.
    AllTagsMatch(Vec<TagId>),
    /// No tag matches.
    NoTagsMatch(Vec<TagId>),
    /// At least one sub-expression matches.
    AnyExprMatch(Vec<TagQuery>),
    /// Every sub-expression matches.
    AllExprMatch(Vec<TagQuery>),
    /// No sub-expression matches.
    NoExprMatch(Vec<TagQuery>),
}

impl TagQuery {
    /// Leaf: at least one of `tags` matches.
    pub fn any_tags(tags: impl Into<Vec<TagId>>) -> Self {
        Self::AnyTagsMatch(tags.into())
    }

    /// Leaf: every one of `tags` matches.
    pub fn all_tags(tags: impl Into<Vec<TagId>>) -> Self {
        Self::AllTagsMatch(tags.into())
    }

    /// Leaf: none of `tags` matches.
    pub fn no_tags(tags: impl Into<Vec<TagId>>) -> Self {
        Self::NoTagsMatch(tags.into())
    }

    /// Combinator: at least one of `exprs` matches.
    pub fn any_of(exprs: impl Into<Vec<TagQuery>>) -> Self {
        Self::AnyExprMatch(exprs.into())
    }

    /// Combinator: every one of `exprs` matches.
    pub fn all_of(exprs: impl Into<Vec<TagQuery>>) -> Self {
        Self::AllExprMatch(exprs.into())
    }

    /// Combinator: none of `exprs` matches.
    pub fn none_of(exprs: impl Into<Vec<TagQuery>>) -> Self {
        Self::NoExprMatch(exprs.into())
    }

    /// Evaluates this query against `container`.
    pub fn matches(&self, container: &TagContainer) -> bool {
        match self {
            Self::AnyTagsMatch(tags) => container.matches_any(tags),
            Self::AllTagsMatch(tags) => container.matches_all(tags),
            Self::NoTagsMatch(tags) => !container.matches_any(tags),
            Self::AnyExprMatch(exprs) => exprs.iter().any(|expr| expr.matches(container)),
            Self::AllExprMatch(exprs) => exprs.iter().all(|expr| expr.matches(container)),
            Self::NoExprMatch(exprs) => !exprs.iter().any(|expr| expr.matches(container)),
        }
    }
}
