//! Error classification shared by every error type in the framework.
//!
//! Concrete error enums live next to the modules that raise them. They all
//! implement [`FrameworkError`] so upper layers can triage failures without
//! matching on each enum.

use gameplay_tags::TagError;

/// How severe an error is, from the runtime's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Expected rejection; the caller can retry or move on.
    Recoverable,
    /// Caller handed us invalid input. Fix the call site.
    Validation,
    /// Framework invariant was violated. A bug on our side.
    Internal,
    /// State is no longer trustworthy; stop driving this entity.
    Fatal,
}

impl ErrorSeverity {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorSeverity::Recoverable => "recoverable",
            ErrorSeverity::Validation => "validation",
            ErrorSeverity::Internal => "internal",
            ErrorSeverity::Fatal => "fatal",
        }
    }

    pub const fn is_recoverable(self) -> bool {
        matches!(self, ErrorSeverity::Recoverable)
    }

    /// True for severities that indicate a framework bug rather than bad input.
    pub const fn is_internal(self) -> bool {
        matches!(self, ErrorSeverity::Internal | ErrorSeverity::Fatal)
    }
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common surface for all framework errors.
pub trait FrameworkError: std::error::Error {
    fn severity(&self) -> ErrorSeverity;

    /// Stable machine-readable code for logs and wire replies.
    fn error_code(&self) -> &'static str;
}

impl FrameworkError for TagError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        // Inherent method on TagError, fully qualified to make that plain.
        TagError::error_code(self)
    }
}
