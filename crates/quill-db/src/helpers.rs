//! Row parsing and column formatting helpers.
//!
//! Timestamps are written with a fixed microsecond precision and a `Z`
//! suffix so text ordering in SQL matches time ordering. Reads also accept
//! `SQLite`'s `datetime('now')` format for rows inserted by hand.

use chrono::{DateTime, SecondsFormat, Utc};
use quill_core::AuditRecord;

use crate::error::DatabaseError;

/// Columns read by [`row_to_record`], in order.
pub const RECORD_COLUMNS: &str = "id, primary_key, entity_name, old_values, new_values, \
     parent_id, operation, timestamp, actor, notes, source_context, session_id";

/// Render a timestamp for storage.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a required TEXT column as `DateTime<Utc>`.
///
/// Handles both RFC 3339 (`"2026-02-09T14:30:00Z"`) and `SQLite`'s default
/// format (`"2026-02-09 14:30:00"`).
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string cannot be parsed as either format.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Query(format!("Failed to parse datetime '{s}': {e}")))
}

/// Parse a TEXT column into a serde-deserializable enum.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string does not match any enum variant.
pub fn parse_enum<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| DatabaseError::Query(format!("Failed to parse enum from '{s}': {e}")))
}

/// Read a nullable TEXT column. Returns `None` for both SQL NULL and empty string.
///
/// `row.get::<String>(idx)` on a NULL column returns an error, not `""`.
///
/// # Errors
///
/// Returns `DatabaseError` if the column read fails.
pub fn get_opt_string(row: &libsql::Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    match row.get::<Option<String>>(idx)? {
        Some(s) if s.is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// Convert a row selected with [`RECORD_COLUMNS`] into a stored record.
///
/// # Errors
///
/// Returns `DatabaseError` if a column is missing or holds malformed data.
pub fn row_to_record(row: &libsql::Row) -> Result<AuditRecord, DatabaseError> {
    let mut record = AuditRecord::new(
        row.get::<String>(2)?,
        parse_enum(&row.get::<String>(6)?)?,
    )
    .with_primary_key(row.get::<String>(1)?)
    .with_values(get_opt_string(row, 3)?, get_opt_string(row, 4)?);

    record.id = Some(row.get::<i64>(0)?);
    record.parent_id = row.get::<Option<i64>>(5)?;
    record.timestamp = Some(parse_datetime(&row.get::<String>(7)?)?);
    record.actor = get_opt_string(row, 8)?;
    record.notes = get_opt_string(row, 9)?;
    record.source_context = get_opt_string(row, 10)?;
    record.session_id = get_opt_string(row, 11)?;
    Ok(record)
}
