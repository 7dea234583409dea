//! Error types for the audit engine.
//!
//! Entity-level errors are isolated by the builder and reported per entity;
//! only strict mode or a failed stamp turns them into a batch-level error.
//! Sink errors are defined by each sink and never pass through this type.

use thiserror::Error;

/// Errors raised while building or stamping an audit batch.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The entity type is incompletely described (bad or missing key metadata).
    #[error("Entity type '{entity_type}' is misconfigured: {reason}")]
    Misconfigured { entity_type: String, reason: String },

    /// A declared key field is absent from the entity's snapshot.
    #[error("Key field '{field}' missing from {entity_type} snapshot")]
    MissingKeyField { entity_type: String, field: String },

    /// A snapshot could not be read from the change source.
    #[error("Unreadable snapshot for {entity_type}: {reason}")]
    Snapshot { entity_type: String, reason: String },

    /// The entity's natural key is still unassigned where one is required.
    #[error("Primary key of {entity_type} is not assigned ({operation})")]
    UnresolvedKey {
        entity_type: String,
        operation: String,
    },

    /// Two distinct tracked instances share one natural key.
    #[error("Duplicate {entity_type} with key '{key}' in unit of work")]
    DuplicateKey { entity_type: String, key: String },

    /// Strict mode rejected a batch because at least one entity failed.
    #[error("Audit batch rejected: {failed} entity failure(s), first: {first}")]
    BatchRejected { failed: usize, first: String },

    /// A stored delta payload is not a flat JSON object.
    #[error("Invalid delta payload: {0}")]
    InvalidDelta(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    /// Whether this error describes the audited model rather than one entity.
    #[must_use]
    pub const fn is_misconfiguration(&self) -> bool {
        matches!(self, Self::Misconfigured { .. })
    }
}
