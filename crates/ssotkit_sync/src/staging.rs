//! Staged writes.
//!
//! Field resolution produces a [`StagedWrite`]: the entity under
//! construction plus one slot per relation category, filled field by field
//! and drained by the materializer.

use crate::annotation::CustomRelationshipAnnotation;
use crate::descriptor::RelatedType;
use crate::error::{SyncError, SyncResult};
use ssotkit_store::{Entity, Lookup, ObjectId, Store, StoreError, TypeKey, Value};
use std::collections::BTreeMap;

/// Companion segment naming the namespace of a generic key's target.
pub const APP_LABEL: &str = "app_label";
/// Companion segment naming the type of a generic key's target.
pub const MODEL: &str = "model";

/// Lookup parameters collected for one native foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedForeignKey {
    /// Type the key points at.
    pub related: RelatedType,
    /// Lookup on the related type, keyed by the path after the first segment.
    pub lookup: Lookup,
}

/// A foreign key's resolved target type and lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyTarget {
    /// The related type.
    pub type_key: TypeKey,
    /// Lookup on the related type.
    pub lookup: Lookup,
}

impl StagedForeignKey {
    /// Determines the related type and lookup of this key.
    ///
    /// Returns `None` when every lookup value is empty, meaning the key is
    /// to be cleared. Generic keys take their type from the `app_label` and
    /// `model` companion values.
    ///
    /// # Errors
    ///
    /// `Configuration` if a generic key lacks a companion segment, `Lookup`
    /// if the companions name an unregistered type.
    pub fn into_target(
        self,
        model: &str,
        field: &str,
        store: &Store,
    ) -> SyncResult<Option<ForeignKeyTarget>> {
        let mut lookup = self.lookup;
        let type_key = match self.related {
            RelatedType::Known(type_key) => type_key,
            RelatedType::Generic => {
                let (Some(app_label), Some(type_name)) = (lookup.remove(APP_LABEL), lookup.remove(MODEL))
                else {
                    return Err(SyncError::configuration(
                        model,
                        format!(
                            "missing `{field}__{APP_LABEL}` or `{field}__{MODEL}`; both are required for generic foreign keys"
                        ),
                    ));
                };
                if lookup.all_values_empty() {
                    return Ok(None);
                }
                resolve_generic(field, &app_label, &type_name, store)?
            }
        };
        if lookup.all_values_empty() {
            return Ok(None);
        }
        Ok(Some(ForeignKeyTarget { type_key, lookup }))
    }
}

fn resolve_generic(field: &str, app_label: &Value, type_name: &Value, store: &Store) -> SyncResult<TypeKey> {
    let companions = Lookup::new()
        .with(APP_LABEL, app_label.clone())
        .with(MODEL, type_name.clone());
    let (Some(namespace), Some(name)) = (app_label.as_text(), type_name.as_text()) else {
        return Err(SyncError::Lookup {
            field: field.to_string(),
            lookup: companions,
            source: StoreError::invalid_format("generic key companions must be text"),
        });
    };
    store
        .resolve_type(namespace, name)
        .map_err(|source| SyncError::Lookup {
            field: field.to_string(),
            lookup: companions,
            source,
        })
}

impl ForeignKeyTarget {
    /// Finds the single row this target designates.
    pub fn resolve(self, field: &str, store: &Store) -> SyncResult<Entity> {
        store
            .get(&self.type_key, &self.lookup)
            .map_err(|e| SyncError::from_lookup(field, self.lookup, e))
    }
}

/// Lookup parameters collected for one association-backed foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCustomForeignKey {
    /// The relationship annotation.
    pub annotation: CustomRelationshipAnnotation,
    /// Lookup on the far side's type.
    pub lookup: Lookup,
}

/// Resolved targets of one association-backed to-many field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCustomToMany {
    /// The relationship annotation.
    pub annotation: CustomRelationshipAnnotation,
    /// Far-side entities, in value order.
    pub targets: Vec<ObjectId>,
}

/// Everything needed to persist one object.
#[derive(Debug, Clone)]
pub struct StagedWrite {
    /// The entity under construction. Scalars are already set on it.
    pub entity: Entity,
    /// Native foreign keys, by schema field.
    pub foreign_keys: BTreeMap<String, StagedForeignKey>,
    /// Association-backed foreign keys, by group name.
    pub custom_foreign_keys: BTreeMap<String, StagedCustomForeignKey>,
    /// Native to-many sets, by schema field.
    pub to_many: BTreeMap<String, Vec<ObjectId>>,
    /// Association-backed to-many sets, by model field.
    pub custom_to_many: BTreeMap<String, StagedCustomToMany>,
}

impl StagedWrite {
    /// Starts staging a write of `entity`.
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            foreign_keys: BTreeMap::new(),
            custom_foreign_keys: BTreeMap::new(),
            to_many: BTreeMap::new(),
            custom_to_many: BTreeMap::new(),
        }
    }

    /// Adds one lookup value to the native foreign key `field`.
    #[must_use]
    pub fn with_foreign_key(mut self, field: &str, related: &RelatedType, path: &str, value: Value) -> Self {
        self.foreign_keys
            .entry(field.to_string())
            .or_insert_with(|| StagedForeignKey {
                related: related.clone(),
                lookup: Lookup::new(),
            })
            .lookup
            .insert(path, value);
        self
    }

    /// Adds one lookup value to the association-backed foreign key `field`.
    #[must_use]
    pub fn with_custom_foreign_key(
        mut self,
        field: &str,
        annotation: &CustomRelationshipAnnotation,
        path: &str,
        value: Value,
    ) -> Self {
        self.custom_foreign_keys
            .entry(field.to_string())
            .or_insert_with(|| StagedCustomForeignKey {
                annotation: annotation.clone(),
                lookup: Lookup::new(),
            })
            .lookup
            .insert(path, value);
        self
    }

    /// Returns the number of relation slots filled.
    pub fn relation_count(&self) -> usize {
        self.foreign_keys.len()
            + self.custom_foreign_keys.len()
            + self.to_many.len()
            + self.custom_to_many.len()
    }
}
