//! Natural-key extraction.
//!
//! The key string is the text of each declared key field, in declared order,
//! joined by [`KEY_DELIMITER`]. Stored history depends on this format: changing
//! the delimiter or the per-value rendering requires a data migration.

use crate::descriptor::EntityDescriptor;
use crate::errors::CoreError;
use crate::snapshot::Snapshot;
use crate::tracking::TrackedEntity;

/// Separator between composite key components.
pub const KEY_DELIMITER: &str = ",";

/// Derive the natural key from a snapshot.
///
/// Returns `Ok(None)` while any key field is still `Null` (identity not yet
/// assigned, e.g. before a store-generated insert).
///
/// # Errors
///
/// Returns `CoreError::MissingKeyField` if a declared key field is absent from
/// the snapshot altogether, `CoreError::Misconfigured` if no key fields are
/// declared.
pub fn extract_key(
    descriptor: &EntityDescriptor,
    values: &Snapshot,
) -> Result<Option<String>, CoreError> {
    if descriptor.key_fields.is_empty() {
        return Err(CoreError::Misconfigured {
            entity_type: descriptor.type_name.to_string(),
            reason: "no key fields declared".into(),
        });
    }

    let mut parts = Vec::with_capacity(descriptor.key_fields.len());
    for field in descriptor.key_fields {
        let value = values.get(field).ok_or_else(|| CoreError::MissingKeyField {
            entity_type: descriptor.type_name.to_string(),
            field: (*field).to_string(),
        })?;
        match value.key_text() {
            Some(text) => parts.push(text),
            None => return Ok(None),
        }
    }
    Ok(Some(parts.join(KEY_DELIMITER)))
}

/// Derive the natural key from an entity's current values.
///
/// # Errors
///
/// Propagates snapshot read failures and `CoreError::MissingKeyField`.
pub fn entity_key(entity: &dyn TrackedEntity) -> Result<Option<String>, CoreError> {
    extract_key(entity.descriptor(), &entity.current_values()?)
}
