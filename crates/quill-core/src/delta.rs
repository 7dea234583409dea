//! Delta serialization.
//!
//! A delta is a flat JSON object mapping field names to rendered values, with
//! keys in lexicographic order. Key fields never appear in a delta; they
//! belong in the record's primary key.
//!
//! Null handling:
//! - Without a reference snapshot (an insert) null fields are omitted, so an
//!   absent key means "no value".
//! - With a reference snapshot (an update) the changed field set is computed
//!   once, symmetrically, and each side renders every field of that set. A
//!   field cleared to null appears as `null` on the new side and with its
//!   previous value on the old side, so both payloads always share one key set.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::descriptor::EntityDescriptor;
use crate::errors::CoreError;
use crate::snapshot::Snapshot;
use crate::value::FieldValue;

/// Version of the delta payload format written by this crate.
pub const DELTA_FORMAT_VERSION: u32 = 1;

/// Whitespace layout of rendered payloads. Both layouts parse identically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaFormat {
    #[default]
    Compact,
    Pretty,
}

/// Serializes snapshots of one entity type into delta payloads.
#[derive(Debug, Clone, Copy)]
pub struct DeltaSerializer<'d> {
    descriptor: &'d EntityDescriptor,
    format: DeltaFormat,
}

impl<'d> DeltaSerializer<'d> {
    #[must_use]
    pub const fn new(descriptor: &'d EntityDescriptor, format: DeltaFormat) -> Self {
        Self { descriptor, format }
    }

    /// Render `primary`, restricted by `reference` and `touched`.
    ///
    /// With `reference == None` every non-key, non-null field of `primary` is
    /// emitted. Otherwise only [`changed_fields`](Self::changed_fields) are
    /// emitted, with `primary`'s values. Swapping `primary` and `reference`
    /// yields the complementary payload over the identical field set.
    #[must_use]
    pub fn serialize(
        &self,
        primary: &Snapshot,
        reference: Option<&Snapshot>,
        touched: Option<&BTreeSet<String>>,
    ) -> String {
        let mut map = Map::new();
        match reference {
            None => {
                for (name, value) in primary.iter() {
                    if self.descriptor.is_key_field(name) || value.is_null() {
                        continue;
                    }
                    map.insert(name.to_string(), value.to_json());
                }
            }
            Some(reference) => {
                for name in self.changed_fields(primary, reference, touched) {
                    let value = primary.get(&name).unwrap_or(&FieldValue::Null);
                    map.insert(name, value.to_json());
                }
            }
        }
        self.render(map)
    }

    /// Non-key fields that are touched (or every field, when `touched` is
    /// `None`) and whose values differ between the two snapshots.
    ///
    /// Symmetric in its two snapshot arguments. A field missing from one
    /// snapshot is compared as `Null`.
    #[must_use]
    pub fn changed_fields(
        &self,
        a: &Snapshot,
        b: &Snapshot,
        touched: Option<&BTreeSet<String>>,
    ) -> Vec<String> {
        let names: BTreeSet<&str> = a.names().chain(b.names()).collect();
        names
            .into_iter()
            .filter(|name| !self.descriptor.is_key_field(name))
            .filter(|name| touched.is_none_or(|set| set.contains(*name)))
            .filter(|name| {
                let left = a.get(name).unwrap_or(&FieldValue::Null);
                let right = b.get(name).unwrap_or(&FieldValue::Null);
                left != right
            })
            .map(str::to_string)
            .collect()
    }

    fn render(&self, map: Map<String, Value>) -> String {
        let value = Value::Object(map);
        match self.format {
            DeltaFormat::Compact => value.to_string(),
            DeltaFormat::Pretty => {
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

/// Parse a stored delta payload back into its field map.
///
/// # Errors
///
/// Returns `CoreError::InvalidDelta` if the text is not a JSON object.
pub fn parse_delta(text: &str) -> Result<BTreeMap<String, Value>, CoreError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(other) => Err(CoreError::InvalidDelta(format!(
            "expected an object, found {other}"
        ))),
        Err(e) => Err(CoreError::InvalidDelta(e.to_string())),
    }
}
