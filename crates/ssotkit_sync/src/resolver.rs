//! Field resolver.
//!
//! Routes each model field value into the staged write according to the
//! field's class. Foreign keys are only collected here; their lookups run
//! in the materializer once every field has been seen, so the order in
//! which fields arrive does not matter. To-many values are resolved to
//! concrete entities immediately.

use crate::cache::RelationshipCache;
use crate::descriptor::{FieldClass, ModelType};
use crate::error::{SyncError, SyncResult};
use crate::staging::{StagedCustomToMany, StagedWrite};
use ssotkit_store::{Lookup, ObjectId, Store, TypeKey, Value};

/// Classifies `field` and stages `value` into `staged`.
///
/// # Errors
///
/// `Configuration` if the field is not declared on the model or a to-many
/// value is not a list of lookup mappings; `Lookup` or `Ambiguity` if a
/// to-many element does not match exactly one row.
pub fn classify_and_stage(
    model: &ModelType,
    field: &str,
    value: Value,
    staged: StagedWrite,
    store: &Store,
    relationships: &RelationshipCache,
) -> SyncResult<StagedWrite> {
    let mut staged = staged;
    match model.class_of(field)? {
        FieldClass::CustomScalar { name } => {
            staged.entity.set_custom_field(name.clone(), value);
        }
        FieldClass::CustomForeignKey {
            field: group,
            path,
            annotation,
        } => {
            staged = staged.with_custom_foreign_key(group, annotation, path, value);
        }
        FieldClass::ForeignKey {
            field: key,
            path,
            related,
        } => {
            staged = staged.with_foreign_key(key, related, path, value);
        }
        FieldClass::CustomToMany { annotation } => {
            let relationship = relationships.get(store, model.name(), &annotation.name)?;
            let related = relationship.type_of(annotation.far_side());
            let targets = resolve_each(model, field, related, value, store)?;
            staged.custom_to_many.insert(
                field.to_string(),
                StagedCustomToMany {
                    annotation: annotation.clone(),
                    targets,
                },
            );
        }
        FieldClass::ToMany { related } => {
            let targets = resolve_each(model, field, related, value, store)?;
            staged.to_many.insert(field.to_string(), targets);
        }
        FieldClass::Scalar => {
            staged.entity.set(field, value);
        }
    }
    Ok(staged)
}

/// Resolves every lookup mapping of a to-many value to an entity id.
fn resolve_each(
    model: &ModelType,
    field: &str,
    related: &TypeKey,
    value: Value,
    store: &Store,
) -> SyncResult<Vec<ObjectId>> {
    let elements = match value {
        Value::Null => Vec::new(),
        Value::List(elements) => elements,
        other => {
            return Err(SyncError::configuration(
                model.name(),
                format!("`{field}` expects a list of lookup mappings, got {}", other.kind()),
            ))
        }
    };

    let mut ids = Vec::with_capacity(elements.len());
    for element in elements {
        let Value::Map(parameters) = element else {
            return Err(SyncError::configuration(
                model.name(),
                format!("`{field}` elements must be lookup mappings, got {}", element.kind()),
            ));
        };
        let lookup = Lookup::from(parameters);
        let entity = store
            .get(related, &lookup)
            .map_err(|e| SyncError::from_lookup(field, lookup, e))?;
        if !ids.contains(&entity.id) {
            ids.push(entity.id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ModelDescriptor, RelatedType};
    use ssotkit_store::{Entity, SchemaDef};

    fn tag_type() -> TypeKey {
        TypeKey::new("extras", "tag")
    }

    fn device_type() -> TypeKey {
        TypeKey::new("dcim", "device")
    }

    fn setup() -> (Store, ModelType) {
        let store = Store::open_in_memory();
        store
            .register_schema(SchemaDef::new(tag_type()).unique_column("name").column("color"))
            .unwrap();
        store
            .register_schema(SchemaDef::new(TypeKey::new("dcim", "location")).unique_column("name"))
            .unwrap();
        store
            .register_schema(
                SchemaDef::new(device_type())
                    .unique_column("name")
                    .nullable_foreign_key("location", TypeKey::new("dcim", "location"))
                    .many_to_many("tags", tag_type())
                    .custom_field("owner"),
            )
            .unwrap();
        for (name, color) in [("core", "red"), ("edge", "red")] {
            let mut tag = Entity::new(tag_type());
            tag.set("name", name);
            tag.set("color", color);
            store.save(&tag).unwrap();
        }

        let model = ModelType::bind(
            ModelDescriptor::builder("device", device_type())
                .identifier("name")
                .attribute("location__name")
                .attribute("tags")
                .attribute("owner")
                .custom_field("owner", "owner")
                .build(),
            &store,
        )
        .unwrap();
        (store, model)
    }

    fn stage(store: &Store, model: &ModelType, field: &str, value: Value) -> SyncResult<StagedWrite> {
        classify_and_stage(
            model,
            field,
            value,
            StagedWrite::new(Entity::new(device_type())),
            store,
            &RelationshipCache::new(),
        )
    }

    fn tag_lookup(key: &str, value: &str) -> Value {
        Value::List(vec![Value::map([(key, Value::text(value))])])
    }

    #[test]
    fn scalar_goes_to_column() {
        let (store, model) = setup();
        let staged = stage(&store, &model, "name", Value::text("sw1")).unwrap();
        assert_eq!(staged.entity.get("name"), Some(&Value::text("sw1")));
        assert_eq!(staged.relation_count(), 0);
    }

    #[test]
    fn custom_scalar_goes_to_custom_field_store() {
        let (store, model) = setup();
        let staged = stage(&store, &model, "owner", Value::text("ops")).unwrap();
        assert_eq!(staged.entity.custom_field("owner"), Some(&Value::text("ops")));
        assert!(staged.entity.get("owner").is_none());
        assert!(staged.custom_foreign_keys.is_empty());
        assert!(staged.custom_to_many.is_empty());
    }

    #[test]
    fn dotted_field_is_deferred() {
        let (store, model) = setup();
        let staged = stage(&store, &model, "location__name", Value::text("missing")).unwrap();
        let key = &staged.foreign_keys["location"];
        assert_eq!(key.related, RelatedType::Known(TypeKey::new("dcim", "location")));
        assert_eq!(key.lookup, Lookup::new().with("name", "missing"));
    }

    #[test]
    fn to_many_resolves_eagerly() {
        let (store, model) = setup();
        let staged = stage(&store, &model, "tags", tag_lookup("name", "core")).unwrap();
        assert_eq!(staged.to_many["tags"].len(), 1);

        let err = stage(&store, &model, "tags", tag_lookup("name", "dmz")).unwrap_err();
        assert!(matches!(err, SyncError::Lookup { ref field, .. } if field == "tags"));

        let err = stage(&store, &model, "tags", tag_lookup("color", "red")).unwrap_err();
        assert!(matches!(err, SyncError::Ambiguity { count: 2, .. }));
    }

    #[test]
    fn to_many_value_must_be_a_list_of_maps() {
        let (store, model) = setup();
        let err = stage(&store, &model, "tags", Value::text("core")).unwrap_err();
        assert!(matches!(err, SyncError::Configuration { .. }));

        let staged = stage(&store, &model, "tags", Value::Null).unwrap();
        assert!(staged.to_many["tags"].is_empty());
    }

    #[test]
    fn undeclared_field_fails() {
        let (store, model) = setup();
        let err = stage(&store, &model, "serial", Value::text("x")).unwrap_err();
        assert!(err.to_string().contains("not defined on the model"));
    }
}
