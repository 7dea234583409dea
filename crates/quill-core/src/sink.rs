//! The audit sink seam.
//!
//! A sink persists a stamped batch, assigning each record its surrogate id in
//! batch order and resolving in-batch parent links to the parent's id. Sinks
//! that share the audited entities' transaction make the audit rows commit or
//! roll back with their subject mutations. The engine never retries a sink.

use std::convert::Infallible;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::record::AuditRecord;
use crate::stamp::StampedBatch;

/// Persists stamped audit batches.
#[async_trait]
pub trait AuditSink: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist the batch and return the records with ids assigned.
    ///
    /// # Errors
    ///
    /// Returns the sink's own error type, unmodified.
    async fn persist(&self, batch: StampedBatch) -> Result<Vec<AuditRecord>, Self::Error>;
}

/// Sink keeping records in memory (for development and tests).
#[derive(Debug, Default)]
pub struct MemorySink {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record persisted so far, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    type Error = Infallible;

    async fn persist(&self, batch: StampedBatch) -> Result<Vec<AuditRecord>, Self::Error> {
        let mut store = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let mut ids = Vec::with_capacity(batch.len());
        let mut persisted = Vec::with_capacity(batch.len());

        for mut record in batch.into_records() {
            if let Some(parent) = record.parent_index() {
                record.parent_id = ids.get(parent).copied();
            }
            let id = i64::try_from(store.len()).unwrap_or(i64::MAX) + 1;
            record.id = Some(id);
            ids.push(id);
            store.push(record.clone());
            persisted.push(record);
        }
        Ok(persisted)
    }
}
