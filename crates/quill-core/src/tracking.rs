//! The change-source seam.
//!
//! A change source exposes the entities tracked by one unit of work. Each
//! entity is inspected through [`TrackedEntity`], the capability interface an
//! audited type implements (or is adapted to): descriptor, mutation state,
//! current values, last-persisted values, touched fields, and the optional
//! "ignore audit" marker.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::descriptor::EntityDescriptor;
use crate::enums::TrackedState;
use crate::errors::CoreError;
use crate::snapshot::Snapshot;

/// One entity tracked by a unit of work.
#[async_trait]
pub trait TrackedEntity: Send + Sync {
    /// Type name and ordered key fields.
    fn descriptor(&self) -> &EntityDescriptor;

    /// Current mutation state.
    fn state(&self) -> TrackedState;

    /// Current in-memory field values.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Snapshot` if the values cannot be read.
    fn current_values(&self) -> Result<Snapshot, CoreError>;

    /// Last-known persisted field values.
    ///
    /// May round-trip to the underlying store. Must not serve a stale cache.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Snapshot` if the values cannot be read.
    async fn persisted_values(&self) -> Result<Snapshot, CoreError>;

    /// Fields flagged as assigned since the last persist. `None` when the
    /// change source does not track them.
    fn touched_fields(&self) -> Option<BTreeSet<String>>;

    /// The "ignore audit" capability. Entities returning `true` never
    /// produce audit records.
    fn ignore_audit(&self) -> bool {
        false
    }
}

/// The tracked entities of one unit of work.
pub trait ChangeSource {
    /// Every tracked entity, in the source's order. The order is not stable
    /// across calls and carries no meaning for persistence.
    fn tracked_entities(&self) -> Vec<Arc<dyn TrackedEntity>>;
}

impl ChangeSource for [Arc<dyn TrackedEntity>] {
    fn tracked_entities(&self) -> Vec<Arc<dyn TrackedEntity>> {
        self.to_vec()
    }
}

impl ChangeSource for Vec<Arc<dyn TrackedEntity>> {
    fn tracked_entities(&self) -> Vec<Arc<dyn TrackedEntity>> {
        self.clone()
    }
}
