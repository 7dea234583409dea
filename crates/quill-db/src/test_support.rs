//! Shared test utilities for quill-db unit tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use quill_core::memory::MemoryEntity;
use quill_core::{AuditBuilder, EntityDescriptor, FixedClock, Snapshot};

use crate::AuditDb;
use crate::jsonl::JsonlSink;
use crate::service::AuditService;

pub const INVOICE: EntityDescriptor = EntityDescriptor::new("Invoice", &["id"]);

pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

/// In-memory service with the mirror disabled and a fixed clock.
pub async fn test_service() -> AuditService {
    let db = AuditDb::open_local(":memory:").await.unwrap();
    AuditService::from_db(db, AuditBuilder::default(), JsonlSink::disabled())
        .with_clock(Arc::new(FixedClock(noon())))
}

pub fn loaded_invoice(id: i64, total: i64) -> Arc<MemoryEntity> {
    Arc::new(MemoryEntity::loaded(
        INVOICE,
        Snapshot::new().with("id", id).with("total", total),
    ))
}

/// Write step for saves that only touch already-persisted entities.
pub async fn no_writes(_conn: libsql::Connection) -> Result<(), crate::error::DatabaseError> {
    Ok(())
}
