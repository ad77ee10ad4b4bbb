//! Relationship materializer.
//!
//! Turns the relation slots of a [`StagedWrite`] into store state. Foreign
//! keys are resolved before the entity is saved; association-backed and
//! to-many relations after, once the entity's id exists in the store.

use crate::cache::RelationshipCache;
use crate::descriptor::ModelType;
use crate::error::{SyncError, SyncResult};
use crate::staging::{StagedCustomForeignKey, StagedCustomToMany, StagedWrite};
use ssotkit_store::{AssociationFilter, Entity, ObjectId, RelationshipSide, Store};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Association rows touched while relating one object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssociationCounts {
    /// Associations created.
    pub created: usize,
    /// Stale associations deleted.
    pub deleted: usize,
}

impl std::ops::AddAssign for AssociationCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.deleted += rhs.deleted;
    }
}

/// Resolves every staged native foreign key and sets it on the entity.
///
/// A key whose lookup values are all empty is cleared without a lookup.
pub fn resolve_foreign_keys(model: &ModelType, staged: StagedWrite, store: &Store) -> SyncResult<StagedWrite> {
    let mut staged = staged;
    let foreign_keys = std::mem::take(&mut staged.foreign_keys);
    for (field, key) in foreign_keys {
        match key.into_target(model.name(), &field, store)? {
            None => {
                debug!(model = model.name(), field = %field, "clearing foreign key");
                staged.entity.set_foreign_key(field, None);
            }
            Some(target) => {
                let related = target.resolve(&field, store)?;
                staged.entity.set_foreign_key(field, Some(related.object_ref()));
            }
        }
    }
    Ok(staged)
}

/// Points each association-backed foreign key of `entity` at its target.
///
/// The single association anchored at the entity is updated or created.
/// An all-empty lookup removes the anchored associations instead.
pub fn resolve_custom_foreign_keys(
    model: &ModelType,
    entity: &Entity,
    keys: BTreeMap<String, StagedCustomForeignKey>,
    store: &Store,
    relationships: &RelationshipCache,
) -> SyncResult<AssociationCounts> {
    let mut counts = AssociationCounts::default();
    for (field, key) in keys {
        let annotation = key.annotation;
        let relationship = relationships.get(store, model.name(), &annotation.name)?;

        if key.lookup.all_values_empty() {
            let anchored = AssociationFilter::relationship(&relationship.label)
                .with_endpoint(annotation.side, entity.id);
            for association in store.associations(&anchored) {
                store.delete_association(association.id)?;
                counts.deleted += 1;
            }
            continue;
        }

        let far_type = relationship.type_of(annotation.far_side());
        let far = store
            .get(far_type, &key.lookup)
            .map_err(|e| SyncError::from_lookup(&field, key.lookup, e))?;
        let (_, created) = store.update_or_create_association(
            &relationship.label,
            annotation.side,
            entity.id,
            far.id,
        )?;
        if created {
            counts.created += 1;
        }
    }
    Ok(counts)
}

/// Replaces each association-backed to-many set of `entity`.
///
/// Associations anchored at the entity whose far end is not among the
/// targets are deleted first, then one association per target is matched
/// or created. Associations anchored at other entities are left alone.
pub fn set_custom_to_many(
    model: &ModelType,
    entity: &Entity,
    sets: BTreeMap<String, StagedCustomToMany>,
    store: &Store,
    relationships: &RelationshipCache,
) -> SyncResult<AssociationCounts> {
    let mut counts = AssociationCounts::default();
    for (field, set) in sets {
        let annotation = set.annotation;
        let relationship = relationships.get(store, model.name(), &annotation.name)?;
        let wanted: BTreeSet<ObjectId> = set.targets.iter().copied().collect();

        let anchored = AssociationFilter::relationship(&relationship.label)
            .with_endpoint(annotation.side, entity.id);
        // Stale associations go first so cardinality checks only see the wanted set.
        for stale in store.associations(&anchored) {
            if !wanted.contains(&stale.endpoint(annotation.far_side())) {
                store.delete_association(stale.id)?;
                counts.deleted += 1;
            }
        }

        for target in set.targets {
            let (source_id, destination_id) = match annotation.side {
                RelationshipSide::Source => (entity.id, target),
                RelationshipSide::Destination => (target, entity.id),
            };
            let (_, created) =
                store.get_or_create_association(&relationship.label, source_id, destination_id)?;
            if created {
                counts.created += 1;
            }
        }
        debug!(
            model = model.name(),
            field = %field,
            created = counts.created,
            deleted = counts.deleted,
            "set custom relationship"
        );
    }
    Ok(counts)
}

/// Replaces each native to-many set of `entity` with exactly its targets.
///
/// Returns the number of fields set.
pub fn set_to_many(
    model: &ModelType,
    entity: &Entity,
    sets: BTreeMap<String, Vec<ObjectId>>,
    store: &Store,
) -> SyncResult<usize> {
    let count = sets.len();
    for (field, targets) in sets {
        let change = store.set_related(&entity.type_key, &field, entity.id, &targets)?;
        debug!(
            model = model.name(),
            field = %field,
            added = change.added.len(),
            removed = change.removed.len(),
            "set to-many"
        );
    }
    Ok(count)
}
