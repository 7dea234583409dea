//! Field values as exposed by a change source.
//!
//! `FieldValue` is the closed set of scalar shapes a snapshot may hold. Every
//! variant has a deterministic JSON rendering (for delta payloads) and a
//! deterministic key text (for natural keys). Values that have no faithful
//! JSON form degrade to text instead of failing.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;

/// A single field value in an entity snapshot.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Bytes(Vec<u8>),
    Json(Value),
    /// A value the change source could only describe textually.
    Opaque(String),
}

impl FieldValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in log output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Render the value for a delta payload.
    ///
    /// Non-finite floats have no JSON number form and are emitted as their
    /// textual form (`"NaN"`, `"inf"`, `"-inf"`).
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or_else(
                || {
                    tracing::warn!(value = %f, "non-finite float rendered as text");
                    Value::String(f.to_string())
                },
                Value::Number,
            ),
            Self::Text(s) | Self::Opaque(s) => Value::String(s.clone()),
            Self::Timestamp(ts) => Value::String(format_timestamp(ts)),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Self::Bytes(b) => Value::String(STANDARD.encode(b)),
            Self::Json(v) => v.clone(),
        }
    }

    /// Render the value as a natural-key component. `None` for `Null`.
    #[must_use]
    pub fn key_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) | Self::Opaque(s) => Some(s.clone()),
            Self::Json(Value::String(s)) => Some(s.clone()),
            Self::Json(v) => Some(v.to_string()),
            other => match other.to_json() {
                Value::String(s) => Some(s),
                v => Some(v.to_string()),
            },
        }
    }
}

/// RFC 3339, UTC, `Z` suffix, sub-second digits only when present.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl PartialEq for FieldValue {
    /// Value equality. Floats compare by total order, so a re-assigned `NaN`
    /// is not a change.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::Text(a), Self::Text(b)) | (Self::Opaque(a), Self::Opaque(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for FieldValue {
    /// Values beyond `i64::MAX` degrade to their decimal text.
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Opaque(value.to_string()), Self::Int)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            other => Self::Json(other),
        }
    }
}

impl<T: Into<Self>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
