//! Audit history queries.
//!
//! Read-only access to `audit_history` with dynamic filtering. Returned
//! records carry their ids and parsed timestamps; their payloads can be
//! re-parsed with `AuditRecord::old_delta` / `new_delta`.

use chrono::{DateTime, Utc};
use quill_core::{AuditOperation, AuditRecord};

use crate::error::DatabaseError;
use crate::helpers::{RECORD_COLUMNS, format_timestamp, row_to_record};
use crate::service::AuditService;

const DEFAULT_LIMIT: u32 = 100;

/// Filter criteria for audit queries. Unset fields match everything.
#[derive(Debug, Default, Clone)]
pub struct AuditFilter {
    pub entity_name: Option<String>,
    pub primary_key: Option<String>,
    pub operation: Option<AuditOperation>,
    pub actor: Option<String>,
    pub session_id: Option<String>,
    /// Inclusive lower bound on the record timestamp.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the record timestamp.
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl AuditService {
    /// Query audit records, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, DatabaseError> {
        let mut conditions = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(ref name) = filter.entity_name {
            params.push(libsql::Value::Text(name.clone()));
            conditions.push(format!("entity_name = ?{}", params.len()));
        }
        if let Some(ref key) = filter.primary_key {
            params.push(libsql::Value::Text(key.clone()));
            conditions.push(format!("primary_key = ?{}", params.len()));
        }
        if let Some(operation) = filter.operation {
            params.push(libsql::Value::Text(operation.as_str().to_string()));
            conditions.push(format!("operation = ?{}", params.len()));
        }
        if let Some(ref actor) = filter.actor {
            params.push(libsql::Value::Text(actor.clone()));
            conditions.push(format!("actor = ?{}", params.len()));
        }
        if let Some(ref sid) = filter.session_id {
            params.push(libsql::Value::Text(sid.clone()));
            conditions.push(format!("session_id = ?{}", params.len()));
        }
        if let Some(ref since) = filter.since {
            params.push(libsql::Value::Text(format_timestamp(since)));
            conditions.push(format!("timestamp >= ?{}", params.len()));
        }
        if let Some(ref until) = filter.until {
            params.push(libsql::Value::Text(format_timestamp(until)));
            conditions.push(format!("timestamp < ?{}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT);
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM audit_history {where_clause}
             ORDER BY timestamp DESC, id DESC LIMIT {limit}"
        );

        self.collect(&sql, libsql::params_from_iter(params)).await
    }

    /// Fetch one record by id.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if no record has this id.
    pub async fn get(&self, id: i64) -> Result<AuditRecord, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM audit_history WHERE id = ?1"),
                [id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_record(&row)
    }

    /// Records linked to `parent_id`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn children(&self, parent_id: i64) -> Result<Vec<AuditRecord>, DatabaseError> {
        self.collect(
            &format!("SELECT {RECORD_COLUMNS} FROM audit_history WHERE parent_id = ?1 ORDER BY id"),
            libsql::params![parent_id],
        )
        .await
    }

    /// Full history of one entity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn history(
        &self,
        entity_name: &str,
        primary_key: &str,
    ) -> Result<Vec<AuditRecord>, DatabaseError> {
        self.collect(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM audit_history
                 WHERE entity_name = ?1 AND primary_key = ?2
                 ORDER BY timestamp, id"
            ),
            libsql::params![entity_name, primary_key],
        )
        .await
    }

    async fn collect(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<AuditRecord>, DatabaseError> {
        let mut rows = self.db().conn().query(sql, params).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{loaded_invoice, no_writes, test_service};
    use chrono::Duration;
    use quill_core::{ActorInfo, TrackedEntity};
    use rstest::rstest;
    use std::sync::Arc;

    async fn seeded() -> AuditService {
        let svc = test_service().await;
        let a = loaded_invoice(1, 10);
        a.set("total", 11_i64);
        let b = loaded_invoice(2, 20);
        b.remove();
        let source: Vec<Arc<dyn TrackedEntity>> = vec![a, b];
        svc.save_changes(&source, Some(&ActorInfo::new("alice")), no_writes)
            .await
            .unwrap();
        svc
    }

    #[tokio::test]
    async fn filters_combine() {
        let svc = seeded().await;

        let all = svc.query(&AuditFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let removed = svc
            .query(&AuditFilter {
                operation: Some(AuditOperation::Removed),
                actor: Some("alice".into()),
                ..AuditFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].primary_key.as_deref(), Some("2"));

        let nobody = svc
            .query(&AuditFilter {
                actor: Some("mallory".into()),
                ..AuditFilter::default()
            })
            .await
            .unwrap();
        assert!(nobody.is_empty());
    }

    #[rstest]
    #[case::covers_stamp(0, 1, 2)]
    #[case::ends_at_stamp(-1, 0, 0)]
    #[case::after_stamp(1, 2, 0)]
    #[tokio::test]
    async fn time_window_is_half_open(
        #[case] from_secs: i64,
        #[case] to_secs: i64,
        #[case] expected: usize,
    ) {
        let svc = seeded().await;
        let noon = crate::test_support::noon();

        let found = svc
            .query(&AuditFilter {
                since: Some(noon + Duration::seconds(from_secs)),
                until: Some(noon + Duration::seconds(to_secs)),
                ..AuditFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), expected);
    }

    #[tokio::test]
    async fn limit_caps_results() {
        let svc = seeded().await;
        let one = svc
            .query(&AuditFilter {
                limit: Some(1),
                ..AuditFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn get_unknown_id_is_no_result() {
        let svc = test_service().await;
        assert!(matches!(svc.get(99).await, Err(DatabaseError::NoResult)));
    }
}
