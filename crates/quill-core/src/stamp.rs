//! Metadata stamping.
//!
//! Runs after the audited entities have received their final identities and
//! before the batch is persisted: assigns actor context and the batch
//! timestamp, and backfills the primary key of added records from their
//! now-keyed entities. Consuming an [`AuditBatch`] into a [`StampedBatch`] is
//! the only way to obtain something a sink accepts.

use chrono::{DateTime, SubsecRound, Utc};

use crate::actor::ActorInfo;
use crate::builder::AuditBatch;
use crate::enums::AuditOperation;
use crate::errors::CoreError;
use crate::key;
use crate::record::AuditRecord;

/// Fractional-second digits kept on stamped timestamps (microseconds), so
/// every sink stores the same instant.
pub const TIMESTAMP_PRECISION: u16 = 6;

/// A finalized batch: every record keyed and carrying the same timestamp.
#[derive(Debug)]
pub struct StampedBatch {
    records: Vec<AuditRecord>,
    timestamp: DateTime<Utc>,
}

impl StampedBatch {
    #[must_use]
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hand the records over for persistence. Parents precede their children.
    #[must_use]
    pub fn into_records(self) -> Vec<AuditRecord> {
        self.records
    }
}

impl AuditBatch {
    /// Stamp the batch and release the entity back-references.
    ///
    /// # Errors
    ///
    /// See [`stamp_records`].
    pub fn stamp(
        self,
        actor: Option<&ActorInfo>,
        now: DateTime<Utc>,
    ) -> Result<StampedBatch, CoreError> {
        let now = now.trunc_subsecs(TIMESTAMP_PRECISION);
        let mut records = self.into_records();
        stamp_records(&mut records, actor, now)?;
        for record in &mut records {
            record.entry = None;
        }
        tracing::debug!(records = records.len(), timestamp = %now, "audit batch stamped");
        Ok(StampedBatch {
            records,
            timestamp: now,
        })
    }
}

/// Stamp records in place.
///
/// # Errors
///
/// Returns `CoreError::UnresolvedKey` if a record's primary key is still
/// unassigned after backfill, or the key extractor's error if the entity's
/// key can no longer be read.
pub fn stamp_records(
    records: &mut [AuditRecord],
    actor: Option<&ActorInfo>,
    now: DateTime<Utc>,
) -> Result<(), CoreError> {
    let now = now.trunc_subsecs(TIMESTAMP_PRECISION);
    for record in records.iter_mut() {
        record.actor = actor.and_then(|a| a.actor.clone());
        record.source_context = actor.and_then(|a| a.origin_address.clone());
        record.notes = actor.and_then(|a| a.origin_agent.clone());
        record.session_id = actor.and_then(|a| a.session_id.clone());
        record.timestamp = Some(now);

        if record.operation == AuditOperation::Added {
            if let Some(entry) = &record.entry {
                record.primary_key = key::entity_key(entry.entity())?;
            }
        }
        if record.primary_key.is_none() {
            return Err(CoreError::UnresolvedKey {
                entity_type: record.entity_name.clone(),
                operation: record.operation.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    #[test]
    fn stamps_actor_and_shared_timestamp() {
        let mut records = vec![
            AuditRecord::new("Invoice", AuditOperation::Removed).with_primary_key("1"),
            AuditRecord::new("Invoice", AuditOperation::Modified).with_primary_key("2"),
        ];
        let actor = ActorInfo::new("alice")
            .with_origin_address("10.0.0.1")
            .with_origin_agent("curl/8.0")
            .with_session("ses-1");

        stamp_records(&mut records, Some(&actor), now()).unwrap();

        for record in &records {
            assert_eq!(record.timestamp, Some(now()));
            assert_eq!(record.actor.as_deref(), Some("alice"));
            assert_eq!(record.source_context.as_deref(), Some("10.0.0.1"));
            assert_eq!(record.notes.as_deref(), Some("curl/8.0"));
            assert_eq!(record.session_id.as_deref(), Some("ses-1"));
        }
    }

    #[test]
    fn missing_actor_is_not_an_error() {
        let mut records =
            vec![AuditRecord::new("Invoice", AuditOperation::Removed).with_primary_key("1")];
        stamp_records(&mut records, None, now()).unwrap();
        assert!(records[0].actor.is_none());
        assert!(records[0].source_context.is_none());
        assert_eq!(records[0].timestamp, Some(now()));
    }

    #[test]
    fn timestamps_are_cut_to_microseconds() {
        let precise = now() + chrono::Duration::nanoseconds(123_456_789);
        let batch = AuditBatch::default();
        let stamped = batch.stamp(None, precise).unwrap();
        assert_eq!(stamped.timestamp().timestamp_subsec_nanos(), 123_456_000);

        let mut records =
            vec![AuditRecord::new("Invoice", AuditOperation::Removed).with_primary_key("1")];
        stamp_records(&mut records, None, precise).unwrap();
        assert_eq!(
            records[0].timestamp.map(|ts| ts.timestamp_subsec_nanos()),
            Some(123_456_000)
        );
    }

    #[test]
    fn unkeyed_record_without_entry_is_rejected() {
        let mut records = vec![AuditRecord::new("Invoice", AuditOperation::Added)];
        let err = stamp_records(&mut records, None, now()).unwrap_err();
        assert!(matches!(err, CoreError::UnresolvedKey { .. }));
    }
}
