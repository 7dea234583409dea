//! Compile-time entity descriptors.
//!
//! Each audited entity type declares its logical name and its ordered key
//! fields once, usually as an associated `const`:
//!
//! ```
//! use quill_core::EntityDescriptor;
//!
//! const INVOICE: EntityDescriptor = EntityDescriptor::new("Invoice", &["id"]);
//! assert!(INVOICE.validate().is_ok());
//! ```

use std::collections::HashSet;

use crate::errors::CoreError;

/// Type name and ordered key fields of an audited entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityDescriptor {
    pub type_name: &'static str,
    pub key_fields: &'static [&'static str],
}

impl EntityDescriptor {
    #[must_use]
    pub const fn new(type_name: &'static str, key_fields: &'static [&'static str]) -> Self {
        Self {
            type_name,
            key_fields,
        }
    }

    /// Check that the descriptor fully describes its type.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Misconfigured` for an empty type name, an empty key
    /// list, or blank or duplicated key field names.
    pub fn validate(&self) -> Result<(), CoreError> {
        let fail = |reason: String| CoreError::Misconfigured {
            entity_type: self.type_name.to_string(),
            reason,
        };

        if self.type_name.trim().is_empty() {
            return Err(fail("type name is empty".into()));
        }
        if self.key_fields.is_empty() {
            return Err(fail("no key fields declared".into()));
        }

        let mut seen = HashSet::new();
        for field in self.key_fields {
            if field.trim().is_empty() {
                return Err(fail("blank key field name".into()));
            }
            if !seen.insert(*field) {
                return Err(fail(format!("key field '{field}' declared twice")));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_key_field(&self, name: &str) -> bool {
        self.key_fields.contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_composite_descriptor() {
        let desc = EntityDescriptor::new("OrderLine", &["order_id", "line_no"]);
        assert!(desc.validate().is_ok());
        assert!(desc.is_key_field("line_no"));
        assert!(!desc.is_key_field("sku"));
    }

    #[test]
    fn rejects_missing_keys() {
        let err = EntityDescriptor::new("Invoice", &[]).validate().unwrap_err();
        assert!(err.is_misconfiguration());
        assert!(err.to_string().contains("no key fields"));
    }

    #[test]
    fn rejects_blank_type_name() {
        let err = EntityDescriptor::new("  ", &["id"]).validate().unwrap_err();
        assert!(err.is_misconfiguration());
    }

    #[test]
    fn rejects_duplicate_key_fields() {
        let err = EntityDescriptor::new("Invoice", &["id", "id"])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }
}
