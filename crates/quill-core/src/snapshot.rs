//! Field-name to value snapshots.

use std::collections::BTreeMap;

use crate::value::FieldValue;

/// An entity's field values at one point in time.
///
/// Iteration is always in lexicographic field-name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    fields: BTreeMap<String, FieldValue>,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Insert or replace a field, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.fields.insert(name.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_is_sorted_by_name() {
        let snap = Snapshot::new()
            .with("total", 100_i64)
            .with("id", 7_i64)
            .with("customer", "acme");
        let names: Vec<&str> = snap.names().collect();
        assert_eq!(names, ["customer", "id", "total"]);
    }

    #[test]
    fn insert_replaces_and_returns_previous() {
        let mut snap = Snapshot::new().with("total", 100_i64);
        let prev = snap.insert("total", 150_i64);
        assert_eq!(prev, Some(FieldValue::Int(100)));
        assert_eq!(snap.get("total"), Some(&FieldValue::Int(150)));
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn collects_from_pairs() {
        let snap: Snapshot = [("a", 1_i64), ("b", 2_i64)].into_iter().collect();
        assert!(snap.contains("a"));
        assert!(!snap.contains("c"));
        assert!(!snap.is_empty());
    }
}
