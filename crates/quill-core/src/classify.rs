//! Mutation classification.
//!
//! Maps an entity's tracked state onto an audit operation and gathers the
//! snapshots the delta serializer needs for it. The persisted snapshot of a
//! modified entity is fetched here, once per entity, and awaited before the
//! entity's delta can be computed.

use std::collections::BTreeSet;

use crate::enums::{AuditOperation, TrackedState};
use crate::errors::CoreError;
use crate::snapshot::Snapshot;
use crate::tracking::TrackedEntity;

/// Why an entity produces no audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    IgnoreAudit,
    Unchanged,
    Detached,
}

/// Outcome of classifying one tracked entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Skip(SkipReason),
    Removed,
    Added {
        current: Snapshot,
    },
    Modified {
        persisted: Snapshot,
        current: Snapshot,
        touched: Option<BTreeSet<String>>,
    },
}

impl Classification {
    #[must_use]
    pub const fn operation(&self) -> Option<AuditOperation> {
        match self {
            Self::Skip(_) => None,
            Self::Removed => Some(AuditOperation::Removed),
            Self::Added { .. } => Some(AuditOperation::Added),
            Self::Modified { .. } => Some(AuditOperation::Modified),
        }
    }
}

/// Decide, without any I/O, whether an entity is skipped.
#[must_use]
pub fn skip_reason(entity: &dyn TrackedEntity) -> Option<SkipReason> {
    if entity.ignore_audit() {
        return Some(SkipReason::IgnoreAudit);
    }
    match entity.state() {
        TrackedState::Unchanged => Some(SkipReason::Unchanged),
        TrackedState::Detached => Some(SkipReason::Detached),
        TrackedState::Added | TrackedState::Modified | TrackedState::Removed => None,
    }
}

/// Classify an entity and collect its snapshots.
///
/// # Errors
///
/// Propagates snapshot read failures from the change source.
pub async fn classify(entity: &dyn TrackedEntity) -> Result<Classification, CoreError> {
    if let Some(reason) = skip_reason(entity) {
        return Ok(Classification::Skip(reason));
    }

    match entity.state() {
        TrackedState::Removed => Ok(Classification::Removed),
        TrackedState::Added => Ok(Classification::Added {
            current: entity.current_values()?,
        }),
        TrackedState::Modified => {
            let persisted = entity.persisted_values().await?;
            Ok(Classification::Modified {
                persisted,
                current: entity.current_values()?,
                touched: entity.touched_fields(),
            })
        }
        TrackedState::Unchanged => Ok(Classification::Skip(SkipReason::Unchanged)),
        TrackedState::Detached => Ok(Classification::Skip(SkipReason::Detached)),
    }
}
