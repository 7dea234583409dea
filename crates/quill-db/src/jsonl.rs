//! JSONL audit sink.
//!
//! Appends stamped records to daily `{dir}/{yyyy-mm-dd}.jsonl` files using
//! `serde_jsonlines::append_json_lines`. Ids come from a per-sink counter
//! seeded from the highest id already present in the directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use quill_core::{AuditRecord, AuditSink, StampedBatch};

use crate::error::DatabaseError;

/// Append-only file sink. Usable standalone or as a mirror of the database.
pub struct JsonlSink {
    dir: PathBuf,
    enabled: bool,
    last_id: AtomicI64,
}

impl JsonlSink {
    /// Create a sink writing into `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created or an
    /// existing file cannot be read.
    pub fn new(dir: PathBuf) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(&dir).map_err(|e| DatabaseError::Other(e.into()))?;
        let last_id = highest_id(&dir)?;
        Ok(Self {
            dir,
            enabled: true,
            last_id: AtomicI64::new(last_id),
        })
    }

    /// A sink that accepts batches and writes nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
            last_id: AtomicI64::new(0),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append already-persisted records verbatim, keeping their ids.
    ///
    /// Records are grouped by day and each day file is written in one append.
    /// Nothing is written if any record is unstamped.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the file write fails.
    pub fn mirror(&self, records: &[AuditRecord]) -> Result<(), DatabaseError> {
        if !self.enabled || records.is_empty() {
            return Ok(());
        }
        let mut days: BTreeMap<NaiveDate, Vec<&AuditRecord>> = BTreeMap::new();
        for record in records {
            let date = record
                .timestamp
                .map(|ts| ts.date_naive())
                .ok_or_else(|| DatabaseError::InvalidState("unstamped record".into()))?;
            days.entry(date).or_default().push(record);
        }
        for (date, group) in days {
            serde_jsonlines::append_json_lines(self.day_file(date), group)
                .map_err(|e| DatabaseError::Other(e.into()))?;
        }
        Ok(())
    }

    /// Read back every record written on `date`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the file exists but cannot be parsed.
    pub fn read_day(&self, date: NaiveDate) -> Result<Vec<AuditRecord>, DatabaseError> {
        let path = self.day_file(date);
        if !path.exists() {
            return Ok(Vec::new());
        }
        serde_jsonlines::json_lines(&path)
            .and_then(Iterator::collect::<std::io::Result<Vec<AuditRecord>>>)
            .map_err(|e| DatabaseError::Other(e.into()))
    }

    fn day_file(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }
}

#[async_trait]
impl AuditSink for JsonlSink {
    type Error = DatabaseError;

    async fn persist(&self, batch: StampedBatch) -> Result<Vec<AuditRecord>, DatabaseError> {
        let count = i64::try_from(batch.len()).map_err(|e| DatabaseError::Other(e.into()))?;
        let first = self.last_id.fetch_add(count, Ordering::SeqCst) + 1;

        let mut ids: Vec<i64> = Vec::with_capacity(batch.len());
        let mut persisted = Vec::with_capacity(batch.len());
        for (id, mut record) in (first..).zip(batch.into_records()) {
            if let Some(parent) = record.parent_index() {
                record.parent_id = ids.get(parent).copied();
            }
            record.id = Some(id);
            ids.push(id);
            persisted.push(record);
        }

        self.mirror(&persisted)?;
        Ok(persisted)
    }
}

fn highest_id(dir: &Path) -> Result<i64, DatabaseError> {
    let entries = std::fs::read_dir(dir).map_err(|e| DatabaseError::Other(e.into()))?;
    let mut highest = 0;
    for entry in entries {
        let path = entry.map_err(|e| DatabaseError::Other(e.into()))?.path();
        if path.extension().is_none_or(|ext| ext != "jsonl") {
            continue;
        }
        for record in serde_jsonlines::json_lines::<AuditRecord, _>(&path)
            .map_err(|e| DatabaseError::Other(e.into()))?
        {
            let record = record.map_err(|e| DatabaseError::Other(e.into()))?;
            highest = highest.max(record.id.unwrap_or(0));
        }
    }
    Ok(highest)
}
