//! The audit record.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::delta::parse_delta;
use crate::enums::AuditOperation;
use crate::errors::CoreError;
use crate::tracking::TrackedEntity;

/// Transient back-reference from a record to the entity it audits.
///
/// Held between build and stamp so the stamper can re-derive a key assigned
/// by the store. Never serialized.
#[derive(Clone)]
pub struct EntryRef(Arc<dyn TrackedEntity>);

impl EntryRef {
    #[must_use]
    pub fn new(entity: Arc<dyn TrackedEntity>) -> Self {
        Self(entity)
    }

    #[must_use]
    pub fn entity(&self) -> &dyn TrackedEntity {
        self.0.as_ref()
    }
}

impl fmt::Debug for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntryRef")
            .field(&self.0.descriptor().type_name)
            .finish()
    }
}

/// One entity mutation in the audit trail.
///
/// `old_values` is present only for `Modified`; `new_values` for `Added` and
/// `Modified`. For `Modified` both payloads carry the same field set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Surrogate id, assigned by the sink.
    pub id: Option<i64>,
    pub primary_key: Option<String>,
    pub entity_name: String,
    pub old_values: Option<String>,
    pub new_values: Option<String>,
    pub operation: AuditOperation,
    /// Set once per batch by the stamper.
    pub timestamp: Option<DateTime<Utc>>,
    pub actor: Option<String>,
    pub source_context: Option<String>,
    pub notes: Option<String>,
    pub session_id: Option<String>,
    pub parent_id: Option<i64>,
    /// Index of the parent record within the same batch.
    #[serde(skip)]
    pub(crate) parent: Option<usize>,
    #[serde(skip)]
    pub(crate) entry: Option<EntryRef>,
}

impl AuditRecord {
    /// A fresh, unstamped record.
    #[must_use]
    pub fn new(entity_name: impl Into<String>, operation: AuditOperation) -> Self {
        Self {
            id: None,
            primary_key: None,
            entity_name: entity_name.into(),
            old_values: None,
            new_values: None,
            operation,
            timestamp: None,
            actor: None,
            source_context: None,
            notes: None,
            session_id: None,
            parent_id: None,
            parent: None,
            entry: None,
        }
    }

    #[must_use]
    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_values = old;
        self.new_values = new;
        self
    }

    /// Attach the transient entity back-reference.
    #[must_use]
    pub fn with_entry(mut self, entity: Arc<dyn TrackedEntity>) -> Self {
        self.entry = Some(EntryRef::new(entity));
        self
    }

    #[must_use]
    pub const fn entry(&self) -> Option<&EntryRef> {
        self.entry.as_ref()
    }

    /// In-batch index of the parent record, before ids are assigned.
    #[must_use]
    pub const fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    /// Parsed `old_values`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidDelta` if the stored payload is malformed.
    pub fn old_delta(&self) -> Result<Option<BTreeMap<String, Value>>, CoreError> {
        self.old_values.as_deref().map(parse_delta).transpose()
    }

    /// Parsed `new_values`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidDelta` if the stored payload is malformed.
    pub fn new_delta(&self) -> Result<Option<BTreeMap<String, Value>>, CoreError> {
        self.new_values.as_deref().map(parse_delta).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transient_members_are_not_serialized() {
        let mut record = AuditRecord::new("Invoice", AuditOperation::Modified)
            .with_primary_key("7")
            .with_values(Some(r#"{"total":100}"#.into()), Some(r#"{"total":150}"#.into()));
        record.parent = Some(0);

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("parent").is_none());
        assert!(json.get("entry").is_none());
        assert_eq!(json["operation"], json!("modified"));

        let back: AuditRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.parent_index(), None);
        assert_eq!(back.primary_key.as_deref(), Some("7"));
    }

    #[test]
    fn deltas_parse_back() {
        let record = AuditRecord::new("Invoice", AuditOperation::Added)
            .with_values(None, Some(r#"{"total":50}"#.into()));
        assert!(record.old_delta().unwrap().is_none());
        assert_eq!(record.new_delta().unwrap().unwrap()["total"], json!(50));
    }
}
