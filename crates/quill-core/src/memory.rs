//! In-memory tracked entities.
//!
//! `MemoryEntity` adapts a plain field map to [`TrackedEntity`] with the
//! usual change-tracker semantics: assignments mark fields touched (even when
//! the value is unchanged), `accept_changes` makes the current values the
//! persisted ones. Useful as an adapter for types without their own tracker
//! and as a test double.

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::descriptor::EntityDescriptor;
use crate::enums::TrackedState;
use crate::errors::CoreError;
use crate::snapshot::Snapshot;
use crate::tracking::TrackedEntity;
use crate::value::FieldValue;

#[derive(Debug)]
struct MemoryState {
    state: TrackedState,
    persisted: Option<Snapshot>,
    current: Snapshot,
    touched: BTreeSet<String>,
}

/// A change-tracked entity held entirely in memory.
#[derive(Debug)]
pub struct MemoryEntity {
    descriptor: EntityDescriptor,
    ignore_audit: bool,
    inner: RwLock<MemoryState>,
}

impl MemoryEntity {
    /// A new entity pending insert.
    #[must_use]
    pub fn added(descriptor: EntityDescriptor, current: Snapshot) -> Self {
        Self::with_state(descriptor, TrackedState::Added, None, current)
    }

    /// An entity loaded from the store with no pending changes.
    #[must_use]
    pub fn loaded(descriptor: EntityDescriptor, persisted: Snapshot) -> Self {
        let current = persisted.clone();
        Self::with_state(descriptor, TrackedState::Unchanged, Some(persisted), current)
    }

    fn with_state(
        descriptor: EntityDescriptor,
        state: TrackedState,
        persisted: Option<Snapshot>,
        current: Snapshot,
    ) -> Self {
        Self {
            descriptor,
            ignore_audit: false,
            inner: RwLock::new(MemoryState {
                state,
                persisted,
                current,
                touched: BTreeSet::new(),
            }),
        }
    }

    /// Mark the entity as opted out of auditing.
    #[must_use]
    pub fn ignored(mut self) -> Self {
        self.ignore_audit = true;
        self
    }

    /// Assign a field. Marks it touched and moves an unchanged entity to
    /// `Modified`.
    pub fn set(&self, field: &str, value: impl Into<FieldValue>) {
        let mut inner = self.write();
        inner.current.insert(field, value);
        if inner.state == TrackedState::Added {
            return;
        }
        inner.touched.insert(field.to_string());
        if inner.state == TrackedState::Unchanged {
            inner.state = TrackedState::Modified;
        }
    }

    /// Assign a store-generated key value without touching the field.
    pub fn assign_key(&self, field: &str, value: impl Into<FieldValue>) {
        self.write().current.insert(field, value);
    }

    /// Mark for deletion. A never-persisted entity simply detaches.
    pub fn remove(&self) {
        let mut inner = self.write();
        inner.state = if inner.state == TrackedState::Added {
            TrackedState::Detached
        } else {
            TrackedState::Removed
        };
    }

    /// Record that pending changes were persisted.
    pub fn accept_changes(&self) {
        let mut inner = self.write();
        match inner.state {
            TrackedState::Removed | TrackedState::Detached => {
                inner.state = TrackedState::Detached;
                inner.persisted = None;
            }
            _ => {
                inner.state = TrackedState::Unchanged;
                inner.persisted = Some(inner.current.clone());
            }
        }
        inner.touched.clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TrackedEntity for MemoryEntity {
    fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    fn state(&self) -> TrackedState {
        self.read().state
    }

    fn current_values(&self) -> Result<Snapshot, CoreError> {
        Ok(self.read().current.clone())
    }

    async fn persisted_values(&self) -> Result<Snapshot, CoreError> {
        self.read()
            .persisted
            .clone()
            .ok_or_else(|| CoreError::Snapshot {
                entity_type: self.descriptor.type_name.to_string(),
                reason: "entity has never been persisted".into(),
            })
    }

    fn touched_fields(&self) -> Option<BTreeSet<String>> {
        Some(self.read().touched.clone())
    }

    fn ignore_audit(&self) -> bool {
        self.ignore_audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: EntityDescriptor = EntityDescriptor::new("Note", &["id"]);

    #[test]
    fn set_on_loaded_entity_marks_modified_and_touched() {
        let note = MemoryEntity::loaded(NOTE, Snapshot::new().with("id", 1_i64).with("body", "a"));
        assert_eq!(note.state(), TrackedState::Unchanged);

        note.set("body", "a");
        assert_eq!(note.state(), TrackedState::Modified);
        assert_eq!(
            note.touched_fields().unwrap().into_iter().collect::<Vec<_>>(),
            ["body"]
        );
    }

    #[test]
    fn remove_added_entity_detaches() {
        let note = MemoryEntity::added(NOTE, Snapshot::new().with("body", "x"));
        note.remove();
        assert_eq!(note.state(), TrackedState::Detached);
    }

    #[test]
    fn accept_changes_resets_tracking() {
        let note = MemoryEntity::added(NOTE, Snapshot::new().with("id", None::<i64>));
        note.assign_key("id", 9_i64);
        note.accept_changes();

        assert_eq!(note.state(), TrackedState::Unchanged);
        assert!(note.touched_fields().unwrap().is_empty());
        assert_eq!(
            note.current_values().unwrap().get("id"),
            Some(&FieldValue::Int(9))
        );
    }

    #[tokio::test]
    async fn added_entity_has_no_persisted_snapshot() {
        let note = MemoryEntity::added(NOTE, Snapshot::new());
        let err = note.persisted_values().await.unwrap_err();
        assert!(matches!(err, CoreError::Snapshot { .. }));
    }
}
