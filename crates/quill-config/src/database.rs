//! Audit database configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_path() -> String {
    ".quill/audit.db".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// libSQL database file, or `:memory:`.
    #[serde(default = "default_path")]
    pub path: String,

    /// Directory for the JSONL mirror. Empty disables mirroring.
    #[serde(default)]
    pub jsonl_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            jsonl_dir: String::new(),
        }
    }
}

impl DatabaseConfig {
    /// The mirror directory, if mirroring is enabled.
    #[must_use]
    pub fn jsonl_dir(&self) -> Option<PathBuf> {
        if self.jsonl_dir.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.jsonl_dir))
        }
    }

    /// Reject an empty database path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `path` is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.path".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_is_off_by_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.path, ".quill/audit.db");
        assert!(config.jsonl_dir().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn blank_path_is_invalid() {
        let config = DatabaseConfig {
            path: "  ".into(),
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
