//! Filesystem error taxonomy and remote error classification.
//!
//! The remote store reports failures as free-form strings. They are mapped onto
//! a closed set of kinds by substring matching against known phrasings; see
//! [`ERROR_PHRASES`]. The table tracks upstream wording and breaks silently if
//! the store rewords a message, in which case the error surfaces as
//! [`FsError::Unknown`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::ResourceId;

/// Closed set of filesystem failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsErrorKind {
    NotFound,
    NotADirectory,
    IsADirectory,
    AlreadyExists,
    /// The session's channel is permanently closed.
    Unavailable,
    /// The remote answered with a payload that violates the protocol.
    InvalidResponse,
    /// A remote error string no phrase matched.
    Unknown,
}

/// Filesystem operation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Not a directory: {0}")]
    NotADirectory(String),
    #[error("Is a directory: {0}")]
    IsADirectory(String),
    #[error("File exists: {0}")]
    AlreadyExists(String),
    #[error("Session unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Unknown(String),
}

impl FsError {
    /// Build an error of `kind` describing `target`.
    #[must_use]
    pub fn new(kind: FsErrorKind, target: impl Into<String>) -> Self {
        let target = target.into();
        match kind {
            FsErrorKind::NotFound => Self::NotFound(target),
            FsErrorKind::NotADirectory => Self::NotADirectory(target),
            FsErrorKind::IsADirectory => Self::IsADirectory(target),
            FsErrorKind::AlreadyExists => Self::AlreadyExists(target),
            FsErrorKind::Unavailable => Self::Unavailable(target),
            FsErrorKind::InvalidResponse => Self::InvalidResponse(target),
            FsErrorKind::Unknown => Self::Unknown(target),
        }
    }

    /// The kind of this error.
    #[must_use]
    pub const fn kind(&self) -> FsErrorKind {
        match self {
            Self::NotFound(_) => FsErrorKind::NotFound,
            Self::NotADirectory(_) => FsErrorKind::NotADirectory,
            Self::IsADirectory(_) => FsErrorKind::IsADirectory,
            Self::AlreadyExists(_) => FsErrorKind::AlreadyExists,
            Self::Unavailable(_) => FsErrorKind::Unavailable,
            Self::InvalidResponse(_) => FsErrorKind::InvalidResponse,
            Self::Unknown(_) => FsErrorKind::Unknown,
        }
    }

    /// Same kind, target rewritten by `f`.
    #[must_use]
    pub fn map_target(self, f: impl FnOnce(String) -> String) -> Self {
        let kind = self.kind();
        let target = match self {
            Self::NotFound(t)
            | Self::NotADirectory(t)
            | Self::IsADirectory(t)
            | Self::AlreadyExists(t)
            | Self::Unavailable(t)
            | Self::InvalidResponse(t)
            | Self::Unknown(t) => t,
        };
        Self::new(kind, f(target))
    }

    #[must_use]
    pub fn not_found(resource: &ResourceId) -> Self {
        Self::NotFound(resource.to_string())
    }

    #[must_use]
    pub fn already_exists(resource: &ResourceId) -> Self {
        Self::AlreadyExists(resource.to_string())
    }

    #[must_use]
    pub fn is_a_directory(resource: &ResourceId) -> Self {
        Self::IsADirectory(resource.to_string())
    }

    #[must_use]
    pub fn invalid_response(what: impl Into<String>) -> Self {
        Self::InvalidResponse(what.into())
    }
}

/// Known remote phrasings, checked in order.
pub const ERROR_PHRASES: &[(&str, FsErrorKind)] = &[
    ("no such file or directory", FsErrorKind::NotFound),
    ("not a directory", FsErrorKind::NotADirectory),
    ("is a directory", FsErrorKind::IsADirectory),
    ("file exist", FsErrorKind::AlreadyExists),
];

/// Classify a raw remote error string.
///
/// Returns `None` for an empty string, which the store uses for "no error".
#[must_use]
pub fn classify(raw: &str) -> Option<FsErrorKind> {
    if raw.is_empty() {
        return None;
    }
    let kind = ERROR_PHRASES
        .iter()
        .find(|(phrase, _)| raw.contains(phrase))
        .map_or(FsErrorKind::Unknown, |(_, kind)| *kind);
    Some(kind)
}

/// Turn an optional remote error into a typed failure for `resource`.
///
/// Known kinds name the resource; unknown strings carry the raw message so it
/// is never swallowed.
///
/// # Errors
/// Returns the mapped error when `raw` is present and non-empty.
pub fn check(raw: Option<&str>, resource: &ResourceId) -> Result<(), FsError> {
    let Some(raw) = raw else {
        return Ok(());
    };
    match classify(raw) {
        None => Ok(()),
        Some(FsErrorKind::Unknown) => Err(FsError::Unknown(raw.to_string())),
        Some(kind) => Err(FsError::new(kind, resource.to_string())),
    }
}
