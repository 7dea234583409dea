//! Audit record builder.
//!
//! Walks every tracked entity of a unit of work exactly once, classifies it,
//! serializes its deltas, extracts its key and assembles the batch. Failures
//! are isolated per entity: a broken entity is reported in
//! [`BuildReport::failures`] and the rest of the batch proceeds, unless the
//! builder runs in strict mode.
//!
//! Entities are processed sequentially. Dropping the returned future aborts
//! the pass at the current entity's snapshot fetch and discards the
//! in-progress batch.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::classify::{self, Classification};
use crate::delta::DeltaSerializer;
use crate::descriptor::EntityDescriptor;
use crate::enums::AuditOperation;
use crate::errors::CoreError;
use crate::key;
use crate::record::AuditRecord;
use crate::settings::EngineSettings;
use crate::tracking::{ChangeSource, TrackedEntity};

/// Extension point for grouping related mutations under a parent record.
///
/// Not installed by default. When installed and `link_parents` is enabled, the
/// builder asks the resolver for a parent of every built record; a returned
/// parent is placed in the batch ahead of its child and linked to it.
pub trait ParentResolver: Send + Sync {
    fn parent(&self, record: &AuditRecord, entity: &dyn TrackedEntity) -> Option<AuditRecord>;
}

/// One entity that could not be turned into an audit record.
#[derive(Debug)]
pub struct EntityFailure {
    pub entity_type: String,
    pub primary_key: Option<String>,
    pub error: CoreError,
}

impl fmt::Display for EntityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.primary_key {
            Some(key) => write!(f, "{} {key}: {}", self.entity_type, self.error),
            None => write!(f, "{}: {}", self.entity_type, self.error),
        }
    }
}

/// Built, unstamped audit records of one unit of work.
#[derive(Debug, Default)]
pub struct AuditBatch {
    records: Vec<AuditRecord>,
}

impl AuditBatch {
    #[must_use]
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn into_records(self) -> Vec<AuditRecord> {
        self.records
    }
}

/// Result of a build pass.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub batch: AuditBatch,
    pub failures: Vec<EntityFailure>,
}

impl BuildReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Turns a unit of work's pending mutations into an audit batch.
#[derive(Clone, Default)]
pub struct AuditBuilder {
    settings: EngineSettings,
    parents: Option<Arc<dyn ParentResolver>>,
}

impl fmt::Debug for AuditBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditBuilder")
            .field("settings", &self.settings)
            .field("parents", &self.parents.is_some())
            .finish()
    }
}

/// Per-call working state of one build pass.
#[derive(Default)]
struct Pass {
    records: Vec<AuditRecord>,
    failures: Vec<EntityFailure>,
    seen_entities: HashSet<usize>,
    seen_keys: HashSet<(String, String)>,
    validated: HashMap<&'static str, Option<String>>,
}

impl AuditBuilder {
    #[must_use]
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            parents: None,
        }
    }

    /// Install a parent resolver. Only consulted when `link_parents` is set.
    #[must_use]
    pub fn with_parent_resolver(mut self, resolver: Arc<dyn ParentResolver>) -> Self {
        self.parents = Some(resolver);
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Build the audit batch for every entity the source tracks.
    ///
    /// # Errors
    ///
    /// Only in strict mode: returns `CoreError::BatchRejected` if any entity
    /// failed. Otherwise failures are returned in the report.
    pub async fn build<S: ChangeSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<BuildReport, CoreError> {
        let mut pass = Pass::default();

        for entity in source.tracked_entities() {
            let address = Arc::as_ptr(&entity).cast::<()>().addr();
            if !pass.seen_entities.insert(address) {
                tracing::debug!(
                    entity = entity.descriptor().type_name,
                    "entity listed twice in unit of work, ignoring repeat"
                );
                continue;
            }

            match self.build_one(&entity, &mut pass.validated).await {
                Ok(Some(record)) => self.push(&mut pass, record, &entity),
                Ok(None) => {}
                Err(error) => {
                    let failure = EntityFailure {
                        entity_type: entity.descriptor().type_name.to_string(),
                        primary_key: key::entity_key(entity.as_ref()).ok().flatten(),
                        error,
                    };
                    tracing::warn!("audit build failed for {failure}");
                    pass.failures.push(failure);
                }
            }
        }

        if self.settings.strict {
            if let Some(first) = pass.failures.first() {
                return Err(CoreError::BatchRejected {
                    failed: pass.failures.len(),
                    first: first.to_string(),
                });
            }
        }

        tracing::debug!(
            records = pass.records.len(),
            failures = pass.failures.len(),
            "audit batch built"
        );
        Ok(BuildReport {
            batch: AuditBatch {
                records: pass.records,
            },
            failures: pass.failures,
        })
    }

    async fn build_one(
        &self,
        entity: &Arc<dyn TrackedEntity>,
        validated: &mut HashMap<&'static str, Option<String>>,
    ) -> Result<Option<AuditRecord>, CoreError> {
        if let Some(reason) = classify::skip_reason(entity.as_ref()) {
            tracing::trace!(entity = entity.descriptor().type_name, ?reason, "skipped");
            return Ok(None);
        }

        let descriptor = *entity.descriptor();
        check_descriptor(&descriptor, validated)?;

        let classification = classify::classify(entity.as_ref()).await?;
        let Some(operation) = classification.operation() else {
            return Ok(None);
        };

        let serializer = DeltaSerializer::new(&descriptor, self.settings.delta_format());
        let (old_values, new_values) = match classification {
            Classification::Skip(_) => return Ok(None),
            Classification::Removed => (None, None),
            Classification::Added { current } => {
                (None, Some(serializer.serialize(&current, None, None)))
            }
            Classification::Modified {
                persisted,
                current,
                touched,
            } => {
                let touched = touched.as_ref();
                if self.settings.skip_empty_modifications
                    && serializer
                        .changed_fields(&persisted, &current, touched)
                        .is_empty()
                {
                    tracing::debug!(
                        entity = descriptor.type_name,
                        "modified entity has no effective changes"
                    );
                    return Ok(None);
                }
                (
                    Some(serializer.serialize(&persisted, Some(&current), touched)),
                    Some(serializer.serialize(&current, Some(&persisted), touched)),
                )
            }
        };

        let primary_key = key::entity_key(entity.as_ref())?;
        if primary_key.is_none() && operation != AuditOperation::Added {
            return Err(CoreError::UnresolvedKey {
                entity_type: descriptor.type_name.to_string(),
                operation: operation.to_string(),
            });
        }

        tracing::debug!(
            entity = descriptor.type_name,
            key = primary_key.as_deref().unwrap_or("<unassigned>"),
            %operation,
            "classified"
        );

        let mut record = AuditRecord::new(descriptor.type_name, operation)
            .with_values(old_values, new_values)
            .with_entry(Arc::clone(entity));
        record.primary_key = primary_key;
        Ok(Some(record))
    }

    fn push(&self, pass: &mut Pass, mut record: AuditRecord, entity: &Arc<dyn TrackedEntity>) {
        if let Some(key) = &record.primary_key {
            if !pass
                .seen_keys
                .insert((record.entity_name.clone(), key.clone()))
            {
                let failure = EntityFailure {
                    entity_type: record.entity_name.clone(),
                    primary_key: Some(key.clone()),
                    error: CoreError::DuplicateKey {
                        entity_type: record.entity_name.clone(),
                        key: key.clone(),
                    },
                };
                tracing::warn!("audit build failed for {failure}");
                pass.failures.push(failure);
                return;
            }
        }

        if self.settings.link_parents {
            if let Some(resolver) = &self.parents {
                if let Some(parent) = resolver.parent(&record, entity.as_ref()) {
                    record.parent = Some(pass.records.len());
                    pass.records.push(parent);
                }
            }
        }
        pass.records.push(record);
    }
}

/// Validate a descriptor once per type per pass.
fn check_descriptor(
    descriptor: &EntityDescriptor,
    validated: &mut HashMap<&'static str, Option<String>>,
) -> Result<(), CoreError> {
    let outcome = validated
        .entry(descriptor.type_name)
        .or_insert_with(|| descriptor.validate().err().map(|e| e.to_string()));
    match outcome {
        None => Ok(()),
        Some(reason) => Err(CoreError::Misconfigured {
            entity_type: descriptor.type_name.to_string(),
            reason: reason.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEntity;
    use crate::snapshot::Snapshot;
    use pretty_assertions::assert_eq;

    const INVOICE: EntityDescriptor = EntityDescriptor::new("Invoice", &["id"]);
    const BROKEN: EntityDescriptor = EntityDescriptor::new("Broken", &[]);

    fn invoice(id: i64, total: i64) -> Arc<MemoryEntity> {
        Arc::new(MemoryEntity::loaded(
            INVOICE,
            Snapshot::new().with("id", id).with("total", total),
        ))
    }

    fn source(entities: &[Arc<MemoryEntity>]) -> Vec<Arc<dyn TrackedEntity>> {
        entities
            .iter()
            .map(|e| Arc::clone(e) as Arc<dyn TrackedEntity>)
            .collect()
    }

    #[tokio::test]
    async fn misconfigured_type_fails_without_blocking_batch() {
        let good = invoice(1, 10);
        good.set("total", 11_i64);
        let bad = Arc::new(MemoryEntity::added(BROKEN, Snapshot::new().with("x", 1_i64)));

        let mut entities = source(&[good]);
        entities.push(bad);

        let report = AuditBuilder::default().build(&entities).await.unwrap();
        assert_eq!(report.batch.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.is_misconfiguration());
        assert_eq!(report.failures[0].entity_type, "Broken");
    }

    #[tokio::test]
    async fn strict_mode_rejects_partial_batches() {
        let bad = Arc::new(MemoryEntity::added(BROKEN, Snapshot::new()));
        let entities: Vec<Arc<dyn TrackedEntity>> = vec![bad];

        let builder = AuditBuilder::new(EngineSettings {
            strict: true,
            ..EngineSettings::default()
        });
        let err = builder.build(&entities).await.unwrap_err();
        assert!(matches!(err, CoreError::BatchRejected { failed: 1, .. }));
    }

    #[tokio::test]
    async fn same_entity_listed_twice_yields_one_record() {
        let entity = invoice(7, 100);
        entity.set("total", 150_i64);
        let entities = source(&[Arc::clone(&entity), entity]);

        let report = AuditBuilder::default().build(&entities).await.unwrap();
        assert_eq!(report.batch.len(), 1);
    }

    #[tokio::test]
    async fn same_key_from_two_instances_is_reported() {
        let first = invoice(7, 100);
        first.set("total", 150_i64);
        let second = invoice(7, 100);
        second.remove();

        let report = AuditBuilder::default()
            .build(&source(&[first, second]))
            .await
            .unwrap();
        assert_eq!(report.batch.len(), 1);
        assert_eq!(
            report.batch.records()[0].new_values.as_deref(),
            Some(r#"{"total":150}"#)
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].primary_key.as_deref(), Some("7"));
        assert!(matches!(
            &report.failures[0].error,
            CoreError::DuplicateKey { entity_type, key } if entity_type == "Invoice" && key == "7"
        ));
    }

    #[tokio::test]
    async fn strict_mode_rejects_duplicate_keys() {
        let first = invoice(7, 100);
        first.set("total", 150_i64);
        let second = invoice(7, 100);
        second.set("total", 175_i64);

        let err = AuditBuilder::new(EngineSettings {
            strict: true,
            ..EngineSettings::default()
        })
        .build(&source(&[first, second]))
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::BatchRejected { failed: 1, .. }));
    }

    /// Modified entity whose store read always fails.
    struct UnreadableStore;

    #[async_trait::async_trait]
    impl TrackedEntity for UnreadableStore {
        fn descriptor(&self) -> &EntityDescriptor {
            &INVOICE
        }

        fn state(&self) -> crate::enums::TrackedState {
            crate::enums::TrackedState::Modified
        }

        fn current_values(&self) -> Result<Snapshot, CoreError> {
            Ok(Snapshot::new().with("id", 9_i64).with("total", 1_i64))
        }

        async fn persisted_values(&self) -> Result<Snapshot, CoreError> {
            Err(CoreError::Snapshot {
                entity_type: "Invoice".into(),
                reason: "connection reset".into(),
            })
        }

        fn touched_fields(&self) -> Option<std::collections::BTreeSet<String>> {
            None
        }
    }

    #[tokio::test]
    async fn unreadable_snapshot_fails_only_its_entity() {
        let good = invoice(1, 10);
        good.set("total", 11_i64);
        let mut entities = source(&[good]);
        entities.push(Arc::new(UnreadableStore));

        let report = AuditBuilder::default().build(&entities).await.unwrap();
        assert_eq!(report.batch.len(), 1);
        assert_eq!(report.batch.records()[0].primary_key.as_deref(), Some("1"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].primary_key.as_deref(), Some("9"));
        assert!(matches!(
            report.failures[0].error,
            CoreError::Snapshot { .. }
        ));
    }

    #[tokio::test]
    async fn missing_key_field_fails_only_its_entity() {
        let good = invoice(1, 10);
        good.set("total", 11_i64);
        let keyless = Arc::new(MemoryEntity::loaded(
            INVOICE,
            Snapshot::new().with("total", 5_i64),
        ));
        keyless.remove();

        let report = AuditBuilder::default()
            .build(&source(&[good, keyless]))
            .await
            .unwrap();
        assert_eq!(report.batch.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].primary_key.is_none());
        assert!(matches!(
            &report.failures[0].error,
            CoreError::MissingKeyField { field, .. } if field == "id"
        ));
    }

    #[tokio::test]
    async fn empty_modification_is_kept_when_configured() {
        let entity = invoice(7, 100);
        entity.set("total", 100_i64);

        let skipped = AuditBuilder::default()
            .build(&source(&[Arc::clone(&entity)]))
            .await
            .unwrap();
        assert!(skipped.batch.is_empty());

        let kept = AuditBuilder::new(EngineSettings {
            skip_empty_modifications: false,
            ..EngineSettings::default()
        })
        .build(&source(&[entity]))
        .await
        .unwrap();
        let record = &kept.batch.records()[0];
        assert_eq!(record.old_values.as_deref(), Some("{}"));
        assert_eq!(record.new_values.as_deref(), Some("{}"));
    }

    struct CustomerParent;

    impl ParentResolver for CustomerParent {
        fn parent(&self, record: &AuditRecord, entity: &dyn TrackedEntity) -> Option<AuditRecord> {
            let values = entity.current_values().ok()?;
            let customer = values.get("customer_id")?.key_text()?;
            Some(
                AuditRecord::new("Customer", AuditOperation::Modified)
                    .with_primary_key(customer)
                    .with_values(None, record.new_values.clone()),
            )
        }
    }

    #[tokio::test]
    async fn parent_resolver_is_opt_in() {
        let entity = Arc::new(MemoryEntity::loaded(
            INVOICE,
            Snapshot::new()
                .with("id", 1_i64)
                .with("customer_id", 5_i64)
                .with("total", 1_i64),
        ));
        entity.set("total", 2_i64);
        let entities = source(&[entity]);

        let resolver: Arc<dyn ParentResolver> = Arc::new(CustomerParent);

        let off = AuditBuilder::default()
            .with_parent_resolver(Arc::clone(&resolver))
            .build(&entities)
            .await
            .unwrap();
        assert_eq!(off.batch.len(), 1);

        let on = AuditBuilder::new(EngineSettings {
            link_parents: true,
            ..EngineSettings::default()
        })
        .with_parent_resolver(resolver)
        .build(&entities)
        .await
        .unwrap();
        let records = on.batch.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entity_name, "Customer");
        assert_eq!(records[1].parent_index(), Some(0));
    }
}
