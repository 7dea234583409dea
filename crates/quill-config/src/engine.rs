//! Diff engine configuration.

use quill_core::EngineSettings;
use serde::{Deserialize, Serialize};

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Indent delta payloads. Both layouts parse identically.
    #[serde(default)]
    pub pretty_deltas: bool,

    /// Record nothing for modified entities whose values did not change.
    #[serde(default = "default_true")]
    pub skip_empty_modifications: bool,

    /// Fail the whole save when any entity cannot be audited.
    #[serde(default)]
    pub strict: bool,

    /// Consult an installed parent resolver.
    #[serde(default)]
    pub link_parents: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pretty_deltas: false,
            skip_empty_modifications: default_true(),
            strict: false,
            link_parents: false,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn settings(&self) -> EngineSettings {
        EngineSettings {
            pretty_deltas: self.pretty_deltas,
            skip_empty_modifications: self.skip_empty_modifications,
            strict: self.strict,
            link_parents: self.link_parents,
        }
    }
}
