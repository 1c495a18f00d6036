//! Hierarchical gameplay tag registry and container matching.
//!
//! `gameplay-tags` defines the canonical tag vocabulary (dotted paths such as
//! `Status.Debuff.Stunned` interned into [`TagId`] handles) and the container
//! types that attach tags to entities and answer set queries against them.
//! Matching is queried every frame for every active ability, so the design
//! keeps the hot path to hash lookups:
//!
//! - [`TagRegistry`] precomputes each tag's ancestor chain at registration.
//! - [`TagContainer`] maintains a counted closure (members plus all their
//!   ancestors), making a hierarchical probe a single map lookup.
//! - [`TagCountContainer`] layers counted grants on top so overlapping
//!   sources of the same tag do not clear each other.
//! - [`TagQuery`] composes any/all/none matches into expression trees.
pub mod container;
pub mod count;
pub mod error;
pub mod query;
pub mod registry;

pub use container::TagContainer;
pub use count::TagCountContainer;
pub use error::TagError;
pub use query::TagQuery;
pub use registry::{TagId, TagRegistry};
