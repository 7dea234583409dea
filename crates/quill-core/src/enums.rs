//! Audit operations and tracked mutation states.
//!
//! Both enums use `snake_case` serialization; `as_str()` is the storage form.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// AuditOperation
// ---------------------------------------------------------------------------

/// Kind of mutation an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    Added,
    Modified,
    Removed,
}

impl AuditOperation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }

    /// Whether records of this kind carry `old_values`.
    #[must_use]
    pub const fn has_old_values(self) -> bool {
        matches!(self, Self::Modified)
    }

    /// Whether records of this kind carry `new_values`.
    #[must_use]
    pub const fn has_new_values(self) -> bool {
        matches!(self, Self::Added | Self::Modified)
    }
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TrackedState
// ---------------------------------------------------------------------------

/// Mutation state of an entity as reported by the change source.
///
/// ```text
/// detached → added → unchanged → modified → unchanged
///                              → removed  → detached
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedState {
    Unchanged,
    Added,
    Modified,
    Removed,
    Detached,
}

impl TrackedState {
    /// The audit operation this state maps to, if any.
    #[must_use]
    pub const fn operation(self) -> Option<AuditOperation> {
        match self {
            Self::Added => Some(AuditOperation::Added),
            Self::Modified => Some(AuditOperation::Modified),
            Self::Removed => Some(AuditOperation::Removed),
            Self::Unchanged | Self::Detached => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
            Self::Detached => "detached",
        }
    }
}

impl fmt::Display for TrackedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
