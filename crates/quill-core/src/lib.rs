//! # quill-core
//!
//! Diff-and-record engine for entity audit trails.
//!
//! Given the pending mutations of one unit of work, the engine produces one
//! [`AuditRecord`](record::AuditRecord) per audited entity carrying only the
//! fields that actually changed:
//! - Field values, snapshots and entity descriptors (the change-source seam)
//! - Key extraction for natural keys, including not-yet-assigned keys
//! - Deterministic delta serialization of changed fields
//! - Mutation classification from tracked entity state
//! - Batch assembly with per-entity failure isolation
//! - Metadata stamping (actor, timestamp, key backfill) before sink hand-off
//! - The audit sink seam and an in-memory sink

pub mod actor;
pub mod builder;
pub mod classify;
pub mod clock;
pub mod delta;
pub mod descriptor;
pub mod enums;
pub mod errors;
pub mod key;
pub mod memory;
pub mod record;
pub mod settings;
pub mod sink;
pub mod snapshot;
pub mod stamp;
pub mod tracking;
pub mod value;

pub use actor::{ActorInfo, ActorResolver, StaticActor};
pub use builder::{AuditBatch, AuditBuilder, BuildReport, EntityFailure, ParentResolver};
pub use clock::{Clock, FixedClock, SystemClock};
pub use descriptor::EntityDescriptor;
pub use enums::{AuditOperation, TrackedState};
pub use errors::CoreError;
pub use record::AuditRecord;
pub use settings::EngineSettings;
pub use sink::{AuditSink, MemorySink};
pub use snapshot::Snapshot;
pub use stamp::StampedBatch;
pub use tracking::{ChangeSource, TrackedEntity};
pub use value::FieldValue;
