//! Tag registration errors.

/// Errors raised while registering or resolving tag paths.
///
/// A failed registration leaves the registry unchanged: validation runs
/// before any node is inserted.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TagError {
    /// Malformed registration input (empty path or empty segment).
    #[error("invalid tag path `{path}`: {reason}")]
    InvalidTagFormat { path: String, reason: &'static str },

    /// Path has more segments than the registry supports.
    #[error("tag path `{path}` exceeds maximum depth of {max_depth} segments")]
    DepthExceeded { path: String, max_depth: usize },

    /// Lookup of a path that was never registered.
    #[error("unknown tag path `{path}`")]
    UnknownTag { path: String },
}

impl TagError {
    /// Stable identifier for logs and wire payloads.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTagFormat { .. } => "TAG_INVALID_FORMAT",
            Self::DepthExceeded { .. } => "TAG_DEPTH_EXCEEDED",
            Self::UnknownTag { .. } => "TAG_UNKNOWN",
        }
    }
}
