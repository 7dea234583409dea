//! Audit sink writing through a borrowed libSQL connection.
//!
//! Pass the connection of an open transaction (`&*tx`) to make the audit rows
//! part of the same commit as the audited writes.

use async_trait::async_trait;
use quill_core::{AuditRecord, AuditSink, StampedBatch};

use crate::error::DatabaseError;
use crate::helpers::format_timestamp;

pub struct TransactionSink<'c> {
    conn: &'c libsql::Connection,
}

impl<'c> TransactionSink<'c> {
    #[must_use]
    pub const fn new(conn: &'c libsql::Connection) -> Self {
        Self { conn }
    }

    async fn insert(&self, record: &AuditRecord) -> Result<i64, DatabaseError> {
        let primary_key = record.primary_key.as_deref().ok_or_else(|| {
            DatabaseError::InvalidState(format!(
                "unkeyed {} record reached the sink",
                record.entity_name
            ))
        })?;
        let timestamp = record.timestamp.as_ref().map(format_timestamp).ok_or_else(|| {
            DatabaseError::InvalidState(format!(
                "unstamped {} record reached the sink",
                record.entity_name
            ))
        })?;

        let mut rows = self
            .conn
            .query(
                "INSERT INTO audit_history (primary_key, entity_name, old_values, new_values,
                    parent_id, operation, timestamp, actor, notes, source_context, session_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 RETURNING id",
                libsql::params![
                    primary_key,
                    record.entity_name.as_str(),
                    record.old_values.as_deref(),
                    record.new_values.as_deref(),
                    record.parent_id,
                    record.operation.as_str(),
                    timestamp,
                    record.actor.as_deref(),
                    record.notes.as_deref(),
                    record.source_context.as_deref(),
                    record.session_id.as_deref()
                ],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok(row.get::<i64>(0)?)
    }
}

#[async_trait]
impl AuditSink for TransactionSink<'_> {
    type Error = DatabaseError;

    async fn persist(&self, batch: StampedBatch) -> Result<Vec<AuditRecord>, DatabaseError> {
        let mut ids: Vec<i64> = Vec::with_capacity(batch.len());
        let mut persisted = Vec::with_capacity(batch.len());

        for mut record in batch.into_records() {
            if let Some(parent) = record.parent_index() {
                record.parent_id = ids.get(parent).copied();
            }
            let id = self.insert(&record).await?;
            record.id = Some(id);
            ids.push(id);
            persisted.push(record);
        }

        tracing::debug!(rows = persisted.len(), "audit rows inserted");
        Ok(persisted)
    }
}
