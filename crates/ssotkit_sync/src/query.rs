//! Read-path query builder.
//!
//! Loads backing rows into normalized instances. The default query selects
//! every row of the model's schema type and eager-loads the foreign keys
//! named by dotted fields.

use crate::cache::RelationshipCache;
use crate::config::{SyncConfig, SYSTEM_OF_RECORD_FIELD};
use crate::descriptor::{FieldClass, ModelType, RelatedType};
use crate::error::{SyncError, SyncResult};
use crate::instance::{ModelFlags, ModelInstance, Params};
use crate::staging::{APP_LABEL, MODEL};
use ssotkit_store::{
    split_path, AssociationFilter, Entity, FieldKind, Query, Row, Store, StoreError, Value,
    PATH_SEPARATOR,
};
use std::collections::{BTreeMap, BTreeSet};

/// Builds the query that loads `model`.
///
/// Uses the model's query override when one is declared.
pub fn build_query(model: &ModelType) -> Query {
    if let Some(query) = model.descriptor().query_override {
        return query(model);
    }
    default_query(model)
}

/// Selects every row of the schema type, eager-loading the first hop of
/// each dotted native foreign key field and every native to-many field.
pub fn default_query(model: &ModelType) -> Query {
    let hints: BTreeSet<&str> = model
        .fields()
        .filter(|field| match model.class_of(field) {
            Ok(FieldClass::ForeignKey { .. }) => field.contains(PATH_SEPARATOR),
            Ok(FieldClass::ToMany { .. }) => true,
            _ => false,
        })
        .map(|field| split_path(field).0)
        .collect();
    Query::all(model.schema_type().clone()).prefetch_related(hints)
}

/// Reads instances of `model` from the store.
pub fn load(
    model: &ModelType,
    store: &Store,
    config: &SyncConfig,
    relationships: &RelationshipCache,
) -> SyncResult<Vec<ModelInstance>> {
    let query = build_query(model);
    if query.type_key != *model.schema_type() {
        return Err(SyncError::configuration(
            model.name(),
            format!("query selects {} instead of {}", query.type_key, model.schema_type()),
        ));
    }

    let mut instances = Vec::new();
    for row in store.execute(&query)? {
        let mut identifiers = Params::new();
        let mut attributes = Params::new();
        for field in model.fields() {
            let value = hydrate(model, field, &row, store, relationships)?;
            if model.is_identifier(field) {
                identifiers.insert(field.to_string(), value);
            } else {
                attributes.insert(field.to_string(), value);
            }
        }

        let mut instance = ModelInstance::new(model, identifiers, attributes)?;
        if let Some(system) = &config.system_of_record {
            let stamped = row.entity.custom_field(SYSTEM_OF_RECORD_FIELD).and_then(Value::as_text);
            if stamped != Some(system.as_str()) {
                instance.flags.insert(ModelFlags::SKIP_UNMATCHED_DST);
            }
        }
        instances.push(instance);
    }
    Ok(instances)
}

/// Reads the value of one model field from a loaded row.
fn hydrate(
    model: &ModelType,
    field: &str,
    row: &Row,
    store: &Store,
    relationships: &RelationshipCache,
) -> SyncResult<Value> {
    let entity = &row.entity;
    match model.class_of(field)? {
        FieldClass::Scalar => read_path(store, entity, field),
        FieldClass::CustomScalar { name } => {
            Ok(entity.custom_field(name).cloned().unwrap_or_default())
        }
        FieldClass::ForeignKey {
            field: key,
            path,
            related,
        } => {
            let Some(target) = entity.foreign_key(key) else {
                return Ok(Value::Null);
            };
            if *related == RelatedType::Generic {
                if path == APP_LABEL {
                    return Ok(Value::text(target.type_key.namespace()));
                }
                if path == MODEL {
                    return Ok(Value::text(target.type_key.name()));
                }
            }
            if path == "id" {
                return Ok(Value::text(target.id.to_string()));
            }
            let related = match row.related.get(key.as_str()) {
                Some(prefetched) => prefetched.clone(),
                None => store.get_ref(target)?,
            };
            read_path(store, &related, path)
        }
        FieldClass::CustomForeignKey {
            path, annotation, ..
        } => {
            let relationship = relationships.get(store, model.name(), &annotation.name)?;
            let anchored = AssociationFilter::relationship(&relationship.label)
                .with_endpoint(annotation.side, entity.id);
            let Some(association) = store.associations(&anchored).into_iter().next() else {
                return Ok(Value::Null);
            };
            let far_side = annotation.far_side();
            let far = store.get_by_id(relationship.type_of(far_side), association.endpoint(far_side))?;
            read_path(store, &far, path)
        }
        FieldClass::ToMany { .. } => {
            let elements = match row.related_sets.get(field) {
                Some(prefetched) => prefetched.clone(),
                None => store.related(model.schema_type(), field, entity.id)?,
            };
            render_elements(model, field, &elements, store)
        }
        FieldClass::CustomToMany { annotation } => {
            let relationship = relationships.get(store, model.name(), &annotation.name)?;
            let anchored = AssociationFilter::relationship(&relationship.label)
                .with_endpoint(annotation.side, entity.id);
            let far_side = annotation.far_side();
            let far_type = relationship.type_of(far_side);
            let elements = store
                .associations(&anchored)
                .into_iter()
                .map(|a| store.get_by_id(far_type, a.endpoint(far_side)))
                .collect::<Result<Vec<_>, _>>()?;
            render_elements(model, field, &elements, store)
        }
    }
}

/// Renders to-many elements as lookup mappings over the field's lookup keys,
/// sorted so that equal sets compare equal.
fn render_elements(
    model: &ModelType,
    field: &str,
    elements: &[Entity],
    store: &Store,
) -> SyncResult<Value> {
    let keys = model.lookup_keys(field);
    let mut rendered = Vec::with_capacity(elements.len());
    for element in elements {
        let mut mapping = BTreeMap::new();
        for key in &keys {
            mapping.insert((*key).to_string(), read_path(store, element, key)?);
        }
        rendered.push(Value::Map(mapping));
    }
    rendered.sort();
    Ok(Value::List(rendered))
}

/// Reads a column, foreign key id or dotted path from an entity.
///
/// Unset foreign keys along the path read as null.
pub fn read_path(store: &Store, entity: &Entity, path: &str) -> SyncResult<Value> {
    let (head, rest) = split_path(path);
    if head == "id" && rest.is_none() {
        return Ok(Value::text(entity.id.to_string()));
    }

    let schema = store.schema(&entity.type_key)?;
    let kind = schema
        .get_field(head)
        .map(|f| &f.kind)
        .ok_or_else(|| StoreError::unknown_field(&entity.type_key, head))?;
    match (kind, rest) {
        (FieldKind::Column { .. }, None) => Ok(entity.get(head).cloned().unwrap_or_default()),
        (FieldKind::ForeignKey { .. }, rest) => match (entity.foreign_key(head), rest) {
            (None, _) => Ok(Value::Null),
            (Some(target), None) => Ok(Value::text(target.id.to_string())),
            (Some(target), Some(rest)) => read_path(store, &store.get_ref(target)?, rest),
        },
        _ => Err(StoreError::unknown_field(&entity.type_key, path).into()),
    }
}
