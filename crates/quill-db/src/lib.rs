//! # quill-db
//!
//! libSQL storage for the Quill audit history.
//!
//! Audit rows are written through the caller's own transaction, so an
//! audited unit of work and its history commit or roll back together.
//! An optional JSONL mirror appends the same records to daily files.
//!
//! Uses the `libsql` crate (C `SQLite` fork) in local mode.

pub mod error;
pub mod helpers;
pub mod jsonl;
mod migrations;
pub mod query;
pub mod service;
pub mod sink;

#[cfg(test)]
mod test_support;

use error::DatabaseError;
use libsql::Builder;

pub use jsonl::JsonlSink;
pub use query::AuditFilter;
pub use service::{AuditService, CommitReport};
pub use sink::TransactionSink;

/// Database handle holding the audit history table.
pub struct AuditDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl AuditDb {
    /// Open a local database at the given path, or `":memory:"`.
    ///
    /// Runs migrations on every open; they are idempotent.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Per-connection in SQLite
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let audit_db = Self { db, conn };
        audit_db.run_migrations().await?;
        tracing::debug!(path, "audit database opened");
        Ok(audit_db)
    }

    /// Access the underlying libSQL connection.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Begin a transaction on the shared connection.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` if `BEGIN` fails.
    pub async fn begin(&self) -> Result<libsql::Transaction, DatabaseError> {
        Ok(self.conn.transaction().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_local_creates_schema() {
        let db = AuditDb::open_local(":memory:").await.unwrap();

        for name in [
            "audit_history",
            "ix_audit_history_tables",
            "ix_audit_history_parent",
        ] {
            let mut rows = db
                .conn()
                .query("SELECT name FROM sqlite_master WHERE name = ?1", [name])
                .await
                .unwrap();
            assert!(rows.next().await.unwrap().is_some(), "'{name}' should exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = AuditDb::open_local(":memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn operation_column_rejects_unknown_values() {
        let db = AuditDb::open_local(":memory:").await.unwrap();
        let result = db
            .conn()
            .execute(
                "INSERT INTO audit_history (primary_key, entity_name, operation, timestamp)
                 VALUES ('1', 'Invoice', 'renamed', '2026-10-18T00:00:00.000000Z')",
                (),
            )
            .await;
        assert!(result.is_err());
    }
}
