//! Object persistence orchestrator.
//!
//! Each create, update or delete of a model instance is one write that moves
//! through [`WriteState`]: fields are staged and foreign keys resolved, the
//! entity is saved with full validation, then associations and to-many sets
//! are written. A failure in any state aborts the write. Unless
//! [`SyncConfig::atomic_writes`] is set, whatever was already written stays.

use crate::cache::RelationshipCache;
use crate::config::{DeletePolicy, SyncConfig, SYSTEM_OF_RECORD_FIELD};
use crate::descriptor::ModelType;
use crate::error::{SyncError, SyncResult};
use crate::instance::Params;
use crate::materializer;
use crate::resolver;
use crate::staging::StagedWrite;
use crate::state::{WriteOperation, WriteReport, WriteState};
use ssotkit_store::{Entity, FieldKind, Lookup, ObjectId, Store, StoreError};
use tracing::{debug, warn};

/// Store handle and pass-wide state shared by every write of a session.
#[derive(Debug, Clone, Copy)]
pub struct WriteContext<'a> {
    /// The backing store.
    pub store: &'a Store,
    /// Session configuration.
    pub config: &'a SyncConfig,
    /// Per-pass relationship cache.
    pub relationships: &'a RelationshipCache,
}

impl<'a> WriteContext<'a> {
    /// Creates a new entity for `identifiers` and `attributes`.
    ///
    /// # Errors
    ///
    /// `Validation` carrying every parameter if the store rejects the
    /// entity, for instance because an object with the same unique values
    /// already exists.
    pub fn create(&self, model: &ModelType, identifiers: &Params, attributes: &Params) -> SyncResult<WriteReport> {
        let mut parameters = identifiers.clone();
        parameters.extend(attributes.clone());
        let entity = Entity::new(model.schema_type().clone());
        self.run(model, WriteOperation::Create, entity, &parameters)
    }

    /// Applies changed `attributes` to the entity found by `identifiers`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no entity matches the identifiers.
    pub fn update(&self, model: &ModelType, identifiers: &Params, attributes: &Params) -> SyncResult<WriteReport> {
        let entity = self.fetch(model, identifiers)?;
        self.run(model, WriteOperation::Update, entity, attributes)
    }

    /// Deletes the entity found by `identifiers`, or marks it under
    /// [`DeletePolicy::Safe`].
    pub fn delete(&self, model: &ModelType, identifiers: &Params) -> SyncResult<WriteReport> {
        let entity = self.fetch(model, identifiers)?;
        let mut write = ObjectWrite::new(model, WriteOperation::Delete, entity.id);
        let result = self.atomically(|| match &self.config.delete_policy {
            DeletePolicy::Hard => {
                write.transition(WriteState::Saving);
                self.store.delete(&entity.type_key, entity.id)?;
                Ok(())
            }
            DeletePolicy::Safe { status, tag } => {
                write.transition(WriteState::Saving);
                self.mark_deleted(model, entity.clone(), status, tag)
            }
        });
        write.finish(result)
    }

    /// Looks up the entity designated by `identifiers`.
    pub fn fetch(&self, model: &ModelType, identifiers: &Params) -> SyncResult<Entity> {
        let lookup = model.identifier_lookup(identifiers)?;
        self.store
            .get(model.schema_type(), &lookup)
            .map_err(|source| match source {
                StoreError::NotFound { .. } | StoreError::ObjectNotFound { .. } => SyncError::NotFound {
                    model: model.name().to_string(),
                    identifiers: lookup,
                    source,
                },
                other => SyncError::Store(other),
            })
    }

    fn run(
        &self,
        model: &ModelType,
        operation: WriteOperation,
        entity: Entity,
        parameters: &Params,
    ) -> SyncResult<WriteReport> {
        let mut write = ObjectWrite::new(model, operation, entity.id);
        if self.config.log_parameters {
            debug!(
                model = model.name(),
                %operation,
                parameters = %Lookup::from(parameters.clone()),
                "writing object"
            );
        }
        let result = self.atomically(|| self.pipeline(&mut write, model, entity, parameters));
        write.finish(result)
    }

    fn pipeline(
        &self,
        write: &mut ObjectWrite,
        model: &ModelType,
        entity: Entity,
        parameters: &Params,
    ) -> SyncResult<()> {
        let mut staged = StagedWrite::new(entity);
        for (field, value) in parameters {
            staged = resolver::classify_and_stage(
                model,
                field,
                value.clone(),
                staged,
                self.store,
                self.relationships,
            )?;
        }
        staged = materializer::resolve_foreign_keys(model, staged, self.store)?;

        if let Some(system) = &self.config.system_of_record {
            if model.schema().custom_fields.contains(SYSTEM_OF_RECORD_FIELD) {
                staged
                    .entity
                    .set_custom_field(SYSTEM_OF_RECORD_FIELD, system.as_str());
            }
        }

        write.transition(WriteState::Saving);
        write.report.inserted = self
            .store
            .save(&staged.entity)
            .map_err(|source| validation_error(model, parameters, source))?;

        write.transition(WriteState::Relating);
        let StagedWrite {
            entity,
            custom_foreign_keys,
            to_many,
            custom_to_many,
            ..
        } = staged;
        let mut counts = materializer::resolve_custom_foreign_keys(
            model,
            &entity,
            custom_foreign_keys,
            self.store,
            self.relationships,
        )?;
        counts += materializer::set_custom_to_many(
            model,
            &entity,
            custom_to_many,
            self.store,
            self.relationships,
        )?;
        write.report.to_many_fields = materializer::set_to_many(model, &entity, to_many, self.store)?;
        write.report.associations_created = counts.created;
        write.report.associations_deleted = counts.deleted;
        Ok(())
    }

    /// Points `status` at the named status and adds the named tag.
    fn mark_deleted(&self, model: &ModelType, entity: Entity, status: &str, tag: &str) -> SyncResult<()> {
        let mut entity = entity;
        let schema = model.schema();

        if let Some(FieldKind::ForeignKey {
            target: Some(status_type),
            ..
        }) = schema.get_field("status").map(|f| &f.kind)
        {
            let lookup = Lookup::new().with("name", status);
            let status = self
                .store
                .get(status_type, &lookup)
                .map_err(|e| SyncError::from_lookup("status", lookup, e))?;
            entity.set_foreign_key("status", Some(status.object_ref()));
        }
        self.store
            .save(&entity)
            .map_err(|source| validation_error(model, &Params::new(), source))?;

        if let Some(FieldKind::ManyToMany { target: tag_type }) = schema.get_field("tags").map(|f| &f.kind) {
            let lookup = Lookup::new().with("name", tag);
            let tag_id = match self.store.get(tag_type, &lookup) {
                Ok(existing) => existing.id,
                Err(e) if e.is_not_found() => {
                    let mut created = Entity::new(tag_type.clone());
                    created.set("name", tag);
                    self.store.save(&created)?;
                    created.id
                }
                Err(e) => return Err(SyncError::from_lookup("tags", lookup, e)),
            };
            let mut tags: Vec<ObjectId> = self.store.related_ids(&entity.type_key, "tags", entity.id)?;
            if !tags.contains(&tag_id) {
                tags.push(tag_id);
                self.store.set_related(&entity.type_key, "tags", entity.id, &tags)?;
            }
        }
        debug!(model = model.name(), object_id = %entity.id, "safe-deleted object");
        Ok(())
    }

    fn atomically<T>(&self, f: impl FnOnce() -> SyncResult<T>) -> SyncResult<T> {
        if self.config.atomic_writes {
            self.store.transaction(|_| f())
        } else {
            f()
        }
    }
}

fn validation_error(model: &ModelType, parameters: &Params, source: StoreError) -> SyncError {
    match source {
        StoreError::Validation { .. } => SyncError::Validation {
            model: model.name().to_string(),
            parameters: Lookup::from(parameters.clone()),
            source,
        },
        other => SyncError::Store(other),
    }
}

/// Tracks the state of one write and logs its transitions.
struct ObjectWrite {
    report: WriteReport,
}

impl ObjectWrite {
    fn new(model: &ModelType, operation: WriteOperation, object_id: ObjectId) -> Self {
        let report = WriteReport::new(model.name(), operation, object_id);
        debug!(
            model = %report.model,
            %operation,
            object_id = %object_id,
            state = %report.state,
            "write started"
        );
        Self { report }
    }

    fn transition(&mut self, next: WriteState) {
        debug_assert!(
            self.report.state.can_transition_to(next),
            "invalid write transition {} -> {next}",
            self.report.state
        );
        self.report.state = next;
        debug!(
            model = %self.report.model,
            object_id = %self.report.object_id,
            state = %next,
            "write state"
        );
    }

    fn finish(mut self, result: SyncResult<()>) -> SyncResult<WriteReport> {
        match result {
            Ok(()) => {
                self.transition(WriteState::Done);
                Ok(self.report)
            }
            Err(error) => {
                let failed_in = self.report.state;
                self.transition(WriteState::Failed);
                warn!(
                    model = %self.report.model,
                    operation = %self.report.operation,
                    object_id = %self.report.object_id,
                    state = %failed_in,
                    error = %error,
                    "write failed"
                );
                Err(error)
            }
        }
    }
}
