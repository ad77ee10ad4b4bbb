//! In-memory relational tables.
//!
//! `Tables` holds every schema, row, link and association of a store and
//! implements the relational rules over them. It has no locking of its own;
//! [`crate::Store`] guards it and clones it for savepoints.

use crate::entity::{Entity, ObjectId};
use crate::error::{StoreError, StoreResult};
use crate::lookup::{split_path, Lookup};
use crate::relationship::{
    AssociationFilter, Relationship, RelationshipAssociation, RelationshipKind, RelationshipSide,
};
use crate::schema::{FieldDef, FieldKind, SchemaDef};
use crate::types::{ObjectRef, TypeKey};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

type LinkTable = BTreeMap<String, BTreeMap<ObjectId, BTreeSet<ObjectId>>>;

/// Outcome of replacing a to-many set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationChange {
    /// Targets newly related.
    pub added: Vec<ObjectId>,
    /// Targets detached.
    pub removed: Vec<ObjectId>,
}

impl RelationChange {
    /// Returns true if the set did not change.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Type key under which associations are reported in errors.
pub(crate) fn association_type() -> TypeKey {
    TypeKey::new("extras", "relationshipassociation")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
    pub schemas: BTreeMap<TypeKey, SchemaDef>,
    pub rows: BTreeMap<TypeKey, BTreeMap<ObjectId, Entity>>,
    #[serde(default)]
    pub links: BTreeMap<TypeKey, LinkTable>,
    #[serde(default)]
    pub relationships: BTreeMap<String, Relationship>,
    #[serde(default)]
    pub associations: BTreeMap<ObjectId, RelationshipAssociation>,
}

impl Tables {
    // === Schema and type registry ===

    pub fn register_schema(&mut self, schema: SchemaDef) -> StoreResult<()> {
        let mut seen = BTreeSet::new();
        for field in &schema.fields {
            if field.name == "id" || field.name == "cf" || field.name.contains("__") {
                return Err(StoreError::invalid_format(format!(
                    "reserved field name `{}` on {}",
                    field.name, schema.type_key
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(StoreError::invalid_format(format!(
                    "duplicate field `{}` on {}",
                    field.name, schema.type_key
                )));
            }
        }
        self.rows.entry(schema.type_key.clone()).or_default();
        self.schemas.insert(schema.type_key.clone(), schema);
        Ok(())
    }

    pub fn schema(&self, type_key: &TypeKey) -> StoreResult<&SchemaDef> {
        self.schemas
            .get(type_key)
            .ok_or_else(|| StoreError::UnknownType {
                type_key: type_key.to_string(),
            })
    }

    pub fn field(&self, type_key: &TypeKey, name: &str) -> StoreResult<&FieldDef> {
        self.schema(type_key)?
            .get_field(name)
            .ok_or_else(|| StoreError::unknown_field(type_key, name))
    }

    pub fn resolve_type(&self, namespace: &str, name: &str) -> StoreResult<TypeKey> {
        let key = TypeKey::new(namespace, name);
        if self.schemas.contains_key(&key) {
            Ok(key)
        } else {
            Err(StoreError::UnknownType {
                type_key: key.to_string(),
            })
        }
    }

    // === Reads ===

    fn rows_of(&self, type_key: &TypeKey) -> StoreResult<&BTreeMap<ObjectId, Entity>> {
        self.rows.get(type_key).ok_or_else(|| StoreError::UnknownType {
            type_key: type_key.to_string(),
        })
    }

    pub fn contains(&self, type_key: &TypeKey, id: ObjectId) -> bool {
        self.rows
            .get(type_key)
            .is_some_and(|rows| rows.contains_key(&id))
    }

    pub fn row(&self, type_key: &TypeKey, id: ObjectId) -> StoreResult<&Entity> {
        self.rows_of(type_key)?
            .get(&id)
            .ok_or_else(|| StoreError::ObjectNotFound {
                type_key: type_key.clone(),
                id,
            })
    }

    pub fn filter(&self, type_key: &TypeKey, lookup: &Lookup) -> StoreResult<Vec<&Entity>> {
        let mut matched = Vec::new();
        'rows: for entity in self.rows_of(type_key)?.values() {
            for (path, expected) in lookup.iter() {
                if !self.matches(entity, path, expected)? {
                    continue 'rows;
                }
            }
            matched.push(entity);
        }
        Ok(matched)
    }

    pub fn get_unique(&self, type_key: &TypeKey, lookup: &Lookup) -> StoreResult<&Entity> {
        let mut matched = self.filter(type_key, lookup)?;
        match matched.len() {
            0 => Err(StoreError::NotFound {
                type_key: type_key.clone(),
                lookup: lookup.to_string(),
            }),
            1 => Ok(matched.remove(0)),
            count => Err(StoreError::MultipleFound {
                type_key: type_key.clone(),
                lookup: lookup.to_string(),
                count,
            }),
        }
    }

    /// Evaluates a single lookup condition against a row.
    pub fn matches(&self, entity: &Entity, path: &str, expected: &Value) -> StoreResult<bool> {
        let (head, rest) = split_path(path);

        if head == "id" && rest.is_none() {
            return Ok(matches_id(entity.id, expected));
        }
        if head == "cf" {
            let name = rest.ok_or_else(|| StoreError::unknown_field(&entity.type_key, path))?;
            return Ok(entity.custom_field(name).unwrap_or(&Value::Null) == expected);
        }

        let field = self.field(&entity.type_key, head)?;
        match (&field.kind, rest) {
            (FieldKind::Column { .. }, None) => {
                Ok(entity.get(head).unwrap_or(&Value::Null) == expected)
            }
            (FieldKind::Column { .. }, Some(_)) => {
                Err(StoreError::unknown_field(&entity.type_key, path))
            }
            (FieldKind::ForeignKey { .. }, rest) => match (entity.foreign_key(head), rest) {
                (None, _) => Ok(expected.is_null()),
                (Some(target), None) => Ok(matches_id(target.id, expected)),
                (Some(target), Some(rest)) => {
                    let related = self.row(&target.type_key, target.id)?;
                    self.matches(related, rest, expected)
                }
            },
            (FieldKind::ManyToMany { target } | FieldKind::OneToMany { target, .. }, rest) => {
                for id in self.related_ids(&entity.type_key, head, entity.id)? {
                    let hit = match rest {
                        None => matches_id(id, expected),
                        Some(rest) => self.matches(self.row(target, id)?, rest, expected)?,
                    };
                    if hit {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    pub fn related_ids(
        &self,
        type_key: &TypeKey,
        field: &str,
        owner: ObjectId,
    ) -> StoreResult<Vec<ObjectId>> {
        match &self.field(type_key, field)?.kind {
            FieldKind::ManyToMany { .. } => Ok(self
                .links
                .get(type_key)
                .and_then(|fields| fields.get(field))
                .and_then(|owners| owners.get(&owner))
                .map(|targets| targets.iter().copied().collect())
                .unwrap_or_default()),
            FieldKind::OneToMany {
                target,
                remote_field,
            } => Ok(self
                .rows_of(target)?
                .values()
                .filter(|row| row.foreign_key(remote_field).is_some_and(|r| r.id == owner))
                .map(|row| row.id)
                .collect()),
            _ => Err(StoreError::invalid_operation(format!(
                "`{field}` on {type_key} is not a to-many field"
            ))),
        }
    }

    // === Writes ===

    pub fn validate(&self, entity: &Entity) -> StoreResult<()> {
        let type_key = &entity.type_key;
        let schema = self.schema(type_key)?;
        let mut errors = Vec::new();

        for name in entity.columns.keys() {
            if !matches!(
                schema.get_field(name).map(|f| &f.kind),
                Some(FieldKind::Column { .. })
            ) {
                errors.push(format!("`{name}` is not a column"));
            }
        }

        for (name, target) in &entity.foreign_keys {
            match schema.get_field(name).map(|f| &f.kind) {
                Some(FieldKind::ForeignKey { target: declared, .. }) => {
                    if let Some(target) = target {
                        if declared.as_ref().is_some_and(|d| *d != target.type_key) {
                            errors.push(format!(
                                "`{name}` must reference {}, not {}",
                                declared.as_ref().map(ToString::to_string).unwrap_or_default(),
                                target.type_key
                            ));
                        } else if !self.contains(&target.type_key, target.id) {
                            errors.push(format!("`{name}` references missing object {target}"));
                        }
                    }
                }
                _ => errors.push(format!("`{name}` is not a foreign key")),
            }
        }

        for name in entity.custom_fields.keys() {
            if !schema.custom_fields.contains(name) {
                errors.push(format!("unknown custom field `{name}`"));
            }
        }

        let others = self
            .rows_of(type_key)?
            .values()
            .filter(|row| row.id != entity.id);

        let mut unique_columns = Vec::new();
        for field in &schema.fields {
            match &field.kind {
                FieldKind::Column { required, unique } => {
                    let value = entity.get(&field.name).unwrap_or(&Value::Null);
                    if *required && value.is_empty() {
                        errors.push(format!("`{}` is required", field.name));
                    }
                    if *unique && !value.is_null() {
                        unique_columns.push((field.name.as_str(), value));
                    }
                }
                FieldKind::ForeignKey {
                    nullable: false, ..
                } if entity.foreign_key(&field.name).is_none() => {
                    errors.push(format!("`{}` is required", field.name));
                }
                _ => {}
            }
        }

        for other in others {
            for (name, value) in &unique_columns {
                if other.get(name) == Some(*value) {
                    errors.push(format!("{type_key} with this {name} already exists"));
                }
            }
            for group in &schema.unique_together {
                let mine: Vec<Value> = group.iter().map(|f| unique_value(entity, f)).collect();
                if mine.iter().any(Value::is_null) {
                    continue;
                }
                if group
                    .iter()
                    .zip(&mine)
                    .all(|(f, value)| unique_value(other, f) == *value)
                {
                    errors.push(format!(
                        "{type_key} with this {} already exists",
                        group.join(", ")
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            errors.dedup();
            Err(StoreError::validation(type_key, errors.join("; ")))
        }
    }

    /// Validates and inserts or replaces the row. Returns true on insert.
    pub fn save(&mut self, entity: Entity) -> StoreResult<bool> {
        self.validate(&entity)?;
        let rows = self
            .rows
            .get_mut(&entity.type_key)
            .ok_or_else(|| StoreError::UnknownType {
                type_key: entity.type_key.to_string(),
            })?;
        Ok(rows.insert(entity.id, entity).is_none())
    }

    pub fn delete(&mut self, type_key: &TypeKey, id: ObjectId) -> StoreResult<()> {
        self.row(type_key, id)?;

        // Collect referencing foreign keys first so a protected delete leaves no trace.
        let mut to_null = Vec::new();
        for (other_key, schema) in &self.schemas {
            for field in &schema.fields {
                let FieldKind::ForeignKey { nullable, .. } = &field.kind else {
                    continue;
                };
                for row in self.rows_of(other_key)?.values() {
                    let points_here = row
                        .foreign_key(&field.name)
                        .is_some_and(|r| r.type_key == *type_key && r.id == id);
                    if !points_here {
                        continue;
                    }
                    if !nullable {
                        return Err(StoreError::Protected {
                            type_key: type_key.clone(),
                            id,
                            referenced_by: format!("{other_key}.{}", field.name),
                        });
                    }
                    to_null.push((other_key.clone(), row.id, field.name.clone()));
                }
            }
        }

        for (other_key, row_id, field) in to_null {
            if let Some(row) = self
                .rows
                .get_mut(&other_key)
                .and_then(|rows| rows.get_mut(&row_id))
            {
                row.set_foreign_key(field, None);
            }
        }

        if let Some(fields) = self.links.get_mut(type_key) {
            for owners in fields.values_mut() {
                owners.remove(&id);
            }
        }
        for (owner_key, fields) in self.links.iter_mut() {
            let Some(schema) = self.schemas.get(owner_key) else {
                continue;
            };
            for (field, owners) in fields.iter_mut() {
                let targets_type = schema
                    .get_field(field)
                    .and_then(FieldDef::related_type)
                    .is_some_and(|t| t == type_key);
                if targets_type {
                    for targets in owners.values_mut() {
                        targets.remove(&id);
                    }
                }
            }
        }

        self.associations
            .retain(|_, a| a.source_id != id && a.destination_id != id);

        if let Some(rows) = self.rows.get_mut(type_key) {
            rows.remove(&id);
        }
        Ok(())
    }

    pub fn set_many_to_many(
        &mut self,
        type_key: &TypeKey,
        field: &str,
        owner: ObjectId,
        targets: &[ObjectId],
    ) -> StoreResult<RelationChange> {
        let FieldKind::ManyToMany { target } = self.field(type_key, field)?.kind.clone() else {
            return Err(StoreError::invalid_operation(format!(
                "`{field}` on {type_key} is not a many-to-many field"
            )));
        };
        self.row(type_key, owner)?;
        for id in targets {
            self.row(&target, *id)?;
        }

        let new: BTreeSet<ObjectId> = targets.iter().copied().collect();
        let slot = self
            .links
            .entry(type_key.clone())
            .or_default()
            .entry(field.to_string())
            .or_default()
            .entry(owner)
            .or_default();
        let change = RelationChange {
            added: new.difference(slot).copied().collect(),
            removed: slot.difference(&new).copied().collect(),
        };
        *slot = new;
        Ok(change)
    }

    pub fn set_reverse_foreign_keys(
        &mut self,
        type_key: &TypeKey,
        field: &str,
        owner: ObjectId,
        targets: &[ObjectId],
    ) -> StoreResult<RelationChange> {
        let FieldKind::OneToMany {
            target,
            remote_field,
        } = self.field(type_key, field)?.kind.clone()
        else {
            return Err(StoreError::invalid_operation(format!(
                "`{field}` on {type_key} is not a reverse foreign key"
            )));
        };
        let nullable = matches!(
            self.field(&target, &remote_field)?.kind,
            FieldKind::ForeignKey { nullable: true, .. }
        );
        self.row(type_key, owner)?;
        for id in targets {
            self.row(&target, *id)?;
        }

        let current: BTreeSet<ObjectId> = self
            .related_ids(type_key, field, owner)?
            .into_iter()
            .collect();
        let new: BTreeSet<ObjectId> = targets.iter().copied().collect();
        let change = RelationChange {
            added: new.difference(&current).copied().collect(),
            removed: current.difference(&new).copied().collect(),
        };

        if !change.removed.is_empty() && !nullable {
            return Err(StoreError::validation(
                &target,
                format!(
                    "cannot detach rows from `{field}`: `{remote_field}` is not nullable"
                ),
            ));
        }

        let owner_ref = ObjectRef::new(type_key.clone(), owner);
        let moves = change
            .removed
            .iter()
            .map(|id| (*id, None))
            .chain(change.added.iter().map(|id| (*id, Some(owner_ref.clone()))));
        let mut previous = Vec::new();
        if let Some(rows) = self.rows.get_mut(&target) {
            for (id, reference) in moves {
                if let Some(row) = rows.get_mut(&id) {
                    let mut candidate = row.clone();
                    candidate.set_foreign_key(remote_field.clone(), reference);
                    previous.push(std::mem::replace(row, candidate));
                }
            }
        }

        // Every moved row is checked against the table with all moves applied.
        let failure = previous.iter().find_map(|old| {
            self.rows
                .get(&target)
                .and_then(|rows| rows.get(&old.id))
                .and_then(|moved| self.validate(moved).err())
        });
        if let Some(error) = failure {
            if let Some(rows) = self.rows.get_mut(&target) {
                for old in previous {
                    rows.insert(old.id, old);
                }
            }
            return Err(error);
        }
        Ok(change)
    }

    // === Relationships ===

    pub fn register_relationship(&mut self, relationship: Relationship) -> StoreResult<()> {
        self.schema(&relationship.source_type)?;
        self.schema(&relationship.destination_type)?;
        self.relationships
            .insert(relationship.label.clone(), relationship);
        Ok(())
    }

    pub fn relationship(&self, label: &str) -> StoreResult<&Relationship> {
        self.relationships
            .get(label)
            .ok_or_else(|| StoreError::RelationshipNotFound {
                label: label.to_string(),
            })
    }

    pub fn find_associations(&self, filter: &AssociationFilter) -> Vec<&RelationshipAssociation> {
        self.associations
            .values()
            .filter(|a| filter.matches(a))
            .collect()
    }

    fn validate_association(
        &self,
        relationship: &Relationship,
        source_id: ObjectId,
        destination_id: ObjectId,
        exclude: Option<ObjectId>,
    ) -> StoreResult<()> {
        let type_key = association_type();
        if !self.contains(&relationship.source_type, source_id) {
            return Err(StoreError::validation(
                &type_key,
                format!("source {} {source_id} does not exist", relationship.source_type),
            ));
        }
        if !self.contains(&relationship.destination_type, destination_id) {
            return Err(StoreError::validation(
                &type_key,
                format!(
                    "destination {} {destination_id} does not exist",
                    relationship.destination_type
                ),
            ));
        }

        let siblings = self.associations.values().filter(|a| {
            a.relationship == relationship.label && Some(a.id) != exclude
        });
        for existing in siblings {
            let same_source = existing.source_id == source_id;
            let same_destination = existing.destination_id == destination_id;
            let conflict = match relationship.kind {
                RelationshipKind::OneToOne => same_source || same_destination,
                RelationshipKind::OneToMany => same_destination,
                RelationshipKind::ManyToMany => same_source && same_destination,
            };
            if conflict {
                return Err(StoreError::validation(
                    &type_key,
                    format!(
                        "association {source_id} -> {destination_id} violates {:?} relationship `{}`",
                        relationship.kind, relationship.label
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn get_or_create_association(
        &mut self,
        label: &str,
        source_id: ObjectId,
        destination_id: ObjectId,
    ) -> StoreResult<(RelationshipAssociation, bool)> {
        let relationship = self.relationship(label)?.clone();
        let filter = AssociationFilter::relationship(label)
            .with_endpoint(RelationshipSide::Source, source_id)
            .with_endpoint(RelationshipSide::Destination, destination_id);
        if let Some(existing) = self.find_associations(&filter).first() {
            return Ok(((*existing).clone(), false));
        }

        self.validate_association(&relationship, source_id, destination_id, None)?;
        let association = RelationshipAssociation {
            id: ObjectId::new(),
            relationship: relationship.label.clone(),
            source_type: relationship.source_type.clone(),
            destination_type: relationship.destination_type.clone(),
            source_id,
            destination_id,
        };
        self.associations.insert(association.id, association.clone());
        Ok((association, true))
    }

    pub fn update_or_create_association(
        &mut self,
        label: &str,
        fixed_side: RelationshipSide,
        fixed_id: ObjectId,
        far_id: ObjectId,
    ) -> StoreResult<(RelationshipAssociation, bool)> {
        let relationship = self.relationship(label)?.clone();
        let filter = AssociationFilter::relationship(label).with_endpoint(fixed_side, fixed_id);
        let existing: Vec<ObjectId> = self.find_associations(&filter).iter().map(|a| a.id).collect();

        let (source_id, destination_id) = match fixed_side {
            RelationshipSide::Source => (fixed_id, far_id),
            RelationshipSide::Destination => (far_id, fixed_id),
        };

        match existing.as_slice() {
            [] => self.get_or_create_association(label, source_id, destination_id),
            [id] => {
                self.validate_association(&relationship, source_id, destination_id, Some(*id))?;
                let association = self
                    .associations
                    .get_mut(id)
                    .ok_or_else(|| StoreError::ObjectNotFound {
                        type_key: association_type(),
                        id: *id,
                    })?;
                association.source_id = source_id;
                association.destination_id = destination_id;
                Ok((association.clone(), false))
            }
            many => Err(StoreError::MultipleFound {
                type_key: association_type(),
                lookup: format!(
                    "{{\"relationship\": {label:?}, \"{fixed_side}_id\": \"{fixed_id}\"}}"
                ),
                count: many.len(),
            }),
        }
    }

    pub fn delete_association(&mut self, id: ObjectId) -> StoreResult<()> {
        self.associations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::ObjectNotFound {
                type_key: association_type(),
                id,
            })
    }
}

fn matches_id(id: ObjectId, expected: &Value) -> bool {
    expected
        .as_text()
        .and_then(|s| s.parse::<ObjectId>().ok())
        .is_some_and(|e| e == id)
}

fn unique_value(entity: &Entity, field: &str) -> Value {
    if let Some(target) = entity.foreign_key(field) {
        return Value::Text(target.id.to_string());
    }
    entity.get(field).cloned().unwrap_or(Value::Null)
}
