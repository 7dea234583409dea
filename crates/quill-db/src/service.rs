//! Service layer running audited saves.
//!
//! `AuditService` wraps `AuditDb` (the audit history), an `AuditBuilder`
//! (the diff engine) and a `JsonlSink` mirror. A save follows this protocol:
//! 1. Build the batch while old snapshots are still readable
//! 2. Begin transaction
//! 3. Caller writes the entities (store-generated keys get assigned)
//! 4. Stamp the batch (actor, timestamp, key backfill)
//! 5. Insert audit rows (inside transaction)
//! 6. Commit, then mirror the rows to JSONL
//!
//! Any error before the commit rolls the entity writes and the audit rows
//! back together.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use quill_core::{
    ActorInfo, ActorResolver, AuditBuilder, AuditRecord, AuditSink, BuildReport, ChangeSource,
    Clock, EngineSettings, EntityFailure, StaticActor, SystemClock,
};

use crate::AuditDb;
use crate::error::DatabaseError;
use crate::jsonl::JsonlSink;
use crate::sink::TransactionSink;

/// Outcome of an audited save.
#[derive(Debug, Default)]
pub struct CommitReport {
    /// Persisted records, ids assigned.
    pub records: Vec<AuditRecord>,
    /// Entities left out of the history (never in strict mode).
    pub failures: Vec<EntityFailure>,
}

pub struct AuditService {
    db: AuditDb,
    builder: AuditBuilder,
    mirror: JsonlSink,
    clock: Arc<dyn Clock>,
    actors: Arc<dyn ActorResolver>,
}

impl AuditService {
    /// Open a local database and wrap it in a service.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the libSQL database file, or `":memory:"` for tests.
    /// * `jsonl_dir` - Directory for the JSONL mirror. `None` disables it.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or the mirror
    /// directory cannot be prepared.
    pub async fn open(
        db_path: &str,
        settings: EngineSettings,
        jsonl_dir: Option<PathBuf>,
    ) -> Result<Self, DatabaseError> {
        let db = AuditDb::open_local(db_path).await?;
        let mirror = match jsonl_dir {
            Some(dir) => JsonlSink::new(dir)?,
            None => JsonlSink::disabled(),
        };
        Ok(Self::from_db(db, AuditBuilder::new(settings), mirror))
    }

    /// Create from an existing `AuditDb` (for testing).
    #[must_use]
    pub fn from_db(db: AuditDb, builder: AuditBuilder, mirror: JsonlSink) -> Self {
        Self {
            db,
            builder,
            mirror,
            clock: Arc::new(SystemClock),
            actors: Arc::new(StaticActor::default()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resolver consulted when a save is not given an explicit actor.
    #[must_use]
    pub fn with_actor_resolver(mut self, actors: Arc<dyn ActorResolver>) -> Self {
        self.actors = actors;
        self
    }

    #[must_use]
    pub const fn db(&self) -> &AuditDb {
        &self.db
    }

    #[must_use]
    pub const fn builder(&self) -> &AuditBuilder {
        &self.builder
    }

    #[must_use]
    pub const fn mirror(&self) -> &JsonlSink {
        &self.mirror
    }

    /// Build the audit batch for a unit of work.
    ///
    /// Must run before the entities are written: modified entities read
    /// their persisted values here.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Core` if the builder rejects the batch.
    pub async fn build<S: ChangeSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<BuildReport, DatabaseError> {
        Ok(self.builder.build(source).await?)
    }

    /// Stamp a built batch and insert it through `conn`.
    ///
    /// Pass the connection of the transaction the entities were written in;
    /// committing is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Core` if a key is still unassigned, or the
    /// insert error.
    pub async fn commit(
        &self,
        conn: &libsql::Connection,
        report: BuildReport,
        actor: Option<&ActorInfo>,
    ) -> Result<CommitReport, DatabaseError> {
        let resolved = match actor {
            Some(actor) => Some(actor.clone()),
            None => self.actors.resolve(),
        };

        let BuildReport { batch, failures } = report;
        let stamped = batch.stamp(resolved.as_ref(), self.clock.now())?;
        let records = TransactionSink::new(conn).persist(stamped).await?;
        Ok(CommitReport { records, failures })
    }

    /// Run one audited save.
    ///
    /// `write` receives a handle to the open transaction and performs the
    /// entity writes, assigning store-generated keys to the tracked entities.
    ///
    /// # Errors
    ///
    /// Returns the first error from building, writing, stamping or inserting.
    /// The transaction is rolled back in every error case.
    pub async fn save_changes<S, F, Fut>(
        &self,
        source: &S,
        actor: Option<&ActorInfo>,
        write: F,
    ) -> Result<CommitReport, DatabaseError>
    where
        S: ChangeSource + ?Sized,
        F: FnOnce(libsql::Connection) -> Fut,
        Fut: Future<Output = Result<(), DatabaseError>>,
    {
        let report = self.build(source).await?;

        let tx = self.db.begin().await?;
        let outcome = async {
            write(libsql::Connection::clone(&tx)).await?;
            self.commit(&tx, report, actor).await
        }
        .await;

        match outcome {
            Ok(committed) => {
                tx.commit().await?;
                if let Err(e) = self.mirror.mirror(&committed.records) {
                    tracing::warn!("JSONL mirror append failed: {e}");
                }
                tracing::info!(
                    records = committed.records.len(),
                    failures = committed.failures.len(),
                    "audited save committed"
                );
                Ok(committed)
            }
            Err(error) => {
                if let Err(e) = tx.rollback().await {
                    tracing::warn!("rollback after failed save: {e}");
                }
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{loaded_invoice, no_writes, noon, test_service};
    use quill_core::TrackedEntity;

    #[tokio::test]
    async fn commit_uses_the_caller_transaction() {
        let svc = test_service().await;
        let invoice = loaded_invoice(7, 100);
        invoice.set("total", 150_i64);
        let source: Vec<Arc<dyn TrackedEntity>> = vec![invoice];

        let report = svc.build(&source).await.unwrap();
        let tx = svc.db().begin().await.unwrap();
        let committed = svc
            .commit(&tx, report, Some(&ActorInfo::new("alice")))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let stored = svc.get(committed.records[0].id.unwrap()).await.unwrap();
        assert_eq!(stored.primary_key.as_deref(), Some("7"));
        assert_eq!(stored.actor.as_deref(), Some("alice"));
        assert_eq!(stored.timestamp, Some(noon()));
        assert_eq!(stored.old_values.as_deref(), Some(r#"{"total":100}"#));
    }

    #[tokio::test]
    async fn resolver_supplies_missing_actor() {
        let svc = test_service().await.with_actor_resolver(Arc::new(StaticActor(Some(
            ActorInfo::new("svc-batch").with_session("run-1"),
        ))));
        let invoice = loaded_invoice(1, 1);
        invoice.remove();
        let source: Vec<Arc<dyn TrackedEntity>> = vec![invoice];

        let committed = svc
            .save_changes(&source, None, no_writes)
            .await
            .unwrap();
        assert_eq!(committed.records[0].actor.as_deref(), Some("svc-batch"));
        assert_eq!(committed.records[0].session_id.as_deref(), Some("run-1"));
    }
}
