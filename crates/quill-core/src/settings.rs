//! Engine settings.

use crate::delta::DeltaFormat;

/// Behaviour switches for the audit builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Render delta payloads as indented JSON.
    pub pretty_deltas: bool,
    /// Drop modified entities whose touched fields all kept their values.
    pub skip_empty_modifications: bool,
    /// Reject the whole batch if any entity fails to build.
    pub strict: bool,
    /// Consult an installed `ParentResolver` for parent records.
    pub link_parents: bool,
}

impl EngineSettings {
    #[must_use]
    pub const fn delta_format(&self) -> DeltaFormat {
        if self.pretty_deltas {
            DeltaFormat::Pretty
        } else {
            DeltaFormat::Compact
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            pretty_deltas: false,
            skip_empty_modifications: true,
            strict: false,
            link_parents: false,
        }
    }
}
