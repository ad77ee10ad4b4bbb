//! Model declarations and their bound classification tables.
//!
//! A [`ModelDescriptor`] is what a model author writes: the schema type,
//! identifier and attribute field names, and annotations. Binding it against
//! a store produces a [`ModelType`] holding one [`FieldClass`] per field, so
//! that no field has to be re-inspected while objects are written.

use crate::annotation::{CustomFieldAnnotation, CustomRelationshipAnnotation};
use crate::error::{SyncError, SyncResult};
use crate::instance::Params;
use ssotkit_store::{
    split_path, FieldKind, Lookup, Query, RelationshipSide, SchemaDef, Store, StoreError, TypeKey,
    Value, PATH_SEPARATOR,
};
use std::collections::{BTreeMap, BTreeSet};

/// Lookup keys used to render to-many elements when none are declared.
pub const DEFAULT_LOOKUP_KEYS: &[&str] = &["name"];

/// Replaces the default read-path query of a model type.
pub type QueryOverride = fn(&ModelType) -> Query;

/// Type a foreign key points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelatedType {
    /// The schema declares the related type.
    Known(TypeKey),
    /// Generic key; the type comes from the `app_label` and `model`
    /// companion segments supplied with the value.
    Generic,
}

/// Storage classification of a model field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldClass {
    /// Native column, set directly on the entity.
    Scalar,
    /// Value in the entity's custom-field store.
    CustomScalar {
        /// Key in the custom-field store.
        name: String,
    },
    /// Native foreign key, resolved by unique lookup.
    ForeignKey {
        /// The foreign key field on the schema.
        field: String,
        /// Lookup path on the related type.
        path: String,
        /// The related type.
        related: RelatedType,
    },
    /// Single related object stored as a relationship association.
    CustomForeignKey {
        /// Group name; fields sharing it form one lookup.
        field: String,
        /// Lookup path on the related type.
        path: String,
        /// The relationship annotation.
        annotation: CustomRelationshipAnnotation,
    },
    /// Native many-to-many or reverse foreign key set.
    ToMany {
        /// The related type.
        related: TypeKey,
    },
    /// Set of related objects stored as relationship associations.
    CustomToMany {
        /// The relationship annotation.
        annotation: CustomRelationshipAnnotation,
    },
}

/// Declaration of a normalized model.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    /// Model name, unique within a session.
    pub name: String,
    /// Backing schema type.
    pub schema_type: TypeKey,
    /// Identifier fields, in order.
    pub identifiers: Vec<String>,
    /// Attribute fields, in order.
    pub attributes: Vec<String>,
    /// Custom scalar annotations by field.
    pub custom_fields: BTreeMap<String, CustomFieldAnnotation>,
    /// Custom relationship annotations by field.
    pub custom_relationships: BTreeMap<String, CustomRelationshipAnnotation>,
    /// Keys rendered for each element of a to-many field.
    pub lookup_keys: BTreeMap<String, Vec<String>>,
    /// Replacement for the default read-path query.
    pub query_override: Option<QueryOverride>,
}

impl ModelDescriptor {
    /// Starts a declaration.
    pub fn builder(name: impl Into<String>, schema_type: TypeKey) -> ModelDescriptorBuilder {
        ModelDescriptorBuilder {
            descriptor: ModelDescriptor {
                name: name.into(),
                schema_type,
                identifiers: Vec::new(),
                attributes: Vec::new(),
                custom_fields: BTreeMap::new(),
                custom_relationships: BTreeMap::new(),
                lookup_keys: BTreeMap::new(),
                query_override: None,
            },
        }
    }
}

/// Builder for [`ModelDescriptor`].
#[derive(Debug, Clone)]
pub struct ModelDescriptorBuilder {
    descriptor: ModelDescriptor,
}

impl ModelDescriptorBuilder {
    /// Adds an identifier field.
    #[must_use]
    pub fn identifier(mut self, field: impl Into<String>) -> Self {
        self.descriptor.identifiers.push(field.into());
        self
    }

    /// Adds an attribute field.
    #[must_use]
    pub fn attribute(mut self, field: impl Into<String>) -> Self {
        self.descriptor.attributes.push(field.into());
        self
    }

    /// Stores `field` in the custom-field store under `name`.
    #[must_use]
    pub fn custom_field(mut self, field: impl Into<String>, name: impl Into<String>) -> Self {
        self.descriptor
            .custom_fields
            .insert(field.into(), CustomFieldAnnotation::new(name));
        self
    }

    /// Stores `field` as associations of relationship `label`, with this
    /// model on `side`.
    #[must_use]
    pub fn custom_relationship(
        mut self,
        field: impl Into<String>,
        label: impl Into<String>,
        side: RelationshipSide,
    ) -> Self {
        self.descriptor
            .custom_relationships
            .insert(field.into(), CustomRelationshipAnnotation::new(label, side));
        self
    }

    /// Sets the keys rendered for each element of a to-many field.
    #[must_use]
    pub fn lookup_keys<I, S>(mut self, field: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptor
            .lookup_keys
            .insert(field.into(), keys.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the default read-path query.
    #[must_use]
    pub fn query_override(mut self, query: QueryOverride) -> Self {
        self.descriptor.query_override = Some(query);
        self
    }

    /// Finishes the declaration.
    pub fn build(self) -> ModelDescriptor {
        self.descriptor
    }
}

/// A model declaration bound to a store schema.
#[derive(Debug, Clone)]
pub struct ModelType {
    descriptor: ModelDescriptor,
    schema: SchemaDef,
    classes: BTreeMap<String, FieldClass>,
}

impl ModelType {
    /// Classifies every declared field against the store schema.
    ///
    /// # Errors
    ///
    /// `Configuration` if the schema type is unknown, a field is declared
    /// twice, a native field does not exist on the schema, or an identifier
    /// cannot be used as a unique lookup.
    pub fn bind(descriptor: ModelDescriptor, store: &Store) -> SyncResult<Self> {
        let model = descriptor.name.clone();
        if descriptor.identifiers.is_empty() {
            return Err(SyncError::configuration(&model, "at least one identifier is required"));
        }
        let schema = store.schema(&descriptor.schema_type).map_err(|e| match e {
            StoreError::UnknownType { .. } => SyncError::configuration(&model, e.to_string()),
            other => SyncError::Store(other),
        })?;

        let mut seen = BTreeSet::new();
        let mut classes = BTreeMap::new();
        for field in descriptor.identifiers.iter().chain(&descriptor.attributes) {
            if !seen.insert(field.as_str()) {
                return Err(SyncError::configuration(
                    &model,
                    format!("field `{field}` is declared more than once"),
                ));
            }
            let class = classify(&descriptor, &schema, field)?;
            classes.insert(field.clone(), class);
        }

        for field in &descriptor.identifiers {
            let usable = match &classes[field] {
                FieldClass::Scalar | FieldClass::CustomScalar { .. } => true,
                FieldClass::ForeignKey { related, .. } => *related != RelatedType::Generic,
                _ => false,
            };
            if !usable {
                return Err(SyncError::configuration(
                    &model,
                    format!("identifier `{field}` cannot be used for a unique lookup"),
                ));
            }
        }

        Ok(Self {
            descriptor,
            schema,
            classes,
        })
    }

    /// Returns the model name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Returns the backing schema type.
    pub fn schema_type(&self) -> &TypeKey {
        &self.descriptor.schema_type
    }

    /// Returns the backing schema as it was when the model was bound.
    pub fn schema(&self) -> &SchemaDef {
        &self.schema
    }

    /// Returns the declaration.
    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    /// Returns the identifier fields.
    pub fn identifiers(&self) -> &[String] {
        &self.descriptor.identifiers
    }

    /// Returns the attribute fields.
    pub fn attributes(&self) -> &[String] {
        &self.descriptor.attributes
    }

    /// Returns every field, identifiers first.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.descriptor
            .identifiers
            .iter()
            .chain(&self.descriptor.attributes)
            .map(String::as_str)
    }

    /// Returns true if `field` is an identifier.
    pub fn is_identifier(&self, field: &str) -> bool {
        self.descriptor.identifiers.iter().any(|f| f == field)
    }

    /// Returns the classification of a declared field.
    ///
    /// # Errors
    ///
    /// `Configuration` if the field is not defined on the model.
    pub fn class_of(&self, field: &str) -> SyncResult<&FieldClass> {
        self.classes.get(field).ok_or_else(|| {
            SyncError::configuration(self.name(), format!("field `{field}` is not defined on the model"))
        })
    }

    /// Returns the keys rendered for each element of a to-many field.
    pub fn lookup_keys(&self, field: &str) -> Vec<&str> {
        match self.descriptor.lookup_keys.get(field) {
            Some(keys) => keys.iter().map(String::as_str).collect(),
            None => DEFAULT_LOOKUP_KEYS.to_vec(),
        }
    }

    /// Builds the store lookup that finds the entity for `identifiers`.
    pub fn identifier_lookup(&self, identifiers: &Params) -> SyncResult<Lookup> {
        let mut lookup = Lookup::new();
        for field in self.identifiers() {
            let value = identifiers.get(field).cloned().ok_or_else(|| {
                SyncError::configuration(self.name(), format!("missing identifier `{field}`"))
            })?;
            let path = match self.class_of(field)? {
                FieldClass::CustomScalar { name } => format!("cf{PATH_SEPARATOR}{name}"),
                _ => field.clone(),
            };
            lookup.insert(path, value);
        }
        Ok(lookup)
    }

    /// Joins identifier values, in declaration order, into a session key.
    pub fn unique_id(&self, identifiers: &Params) -> String {
        self.identifiers()
            .iter()
            .map(|field| match identifiers.get(field) {
                Some(Value::Text(text)) => text.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            })
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR)
    }
}

fn classify(descriptor: &ModelDescriptor, schema: &SchemaDef, field: &str) -> SyncResult<FieldClass> {
    let model = descriptor.name.as_str();
    if field.is_empty() {
        return Err(SyncError::configuration(model, "field names must not be empty"));
    }

    let custom_field = descriptor.custom_fields.get(field);
    let custom_relationship = descriptor.custom_relationships.get(field);
    let (head, rest) = split_path(field);

    match (custom_field, custom_relationship, rest) {
        (Some(_), Some(_), _) => Err(SyncError::configuration(
            model,
            format!("`{field}` is annotated both as custom field and custom relationship"),
        )),
        (Some(annotation), None, _) => Ok(FieldClass::CustomScalar {
            name: annotation.name.clone(),
        }),
        (None, Some(annotation), Some(path)) => Ok(FieldClass::CustomForeignKey {
            field: head.to_string(),
            path: path.to_string(),
            annotation: annotation.clone(),
        }),
        (None, Some(annotation), None) => Ok(FieldClass::CustomToMany {
            annotation: annotation.clone(),
        }),
        (None, None, Some(path)) => match schema.get_field(head).map(|f| &f.kind) {
            Some(FieldKind::ForeignKey { target, .. }) => Ok(FieldClass::ForeignKey {
                field: head.to_string(),
                path: path.to_string(),
                related: target
                    .clone()
                    .map_or(RelatedType::Generic, RelatedType::Known),
            }),
            _ => Err(SyncError::configuration(
                model,
                format!("`{head}` is not a foreign key of {}", schema.type_key),
            )),
        },
        (None, None, None) => {
            if field == "id" {
                return Ok(FieldClass::Scalar);
            }
            match schema.get_field(field).map(|f| &f.kind) {
                Some(FieldKind::Column { .. }) => Ok(FieldClass::Scalar),
                Some(FieldKind::ForeignKey { target, .. }) => Ok(FieldClass::ForeignKey {
                    field: field.to_string(),
                    path: "id".to_string(),
                    related: target
                        .clone()
                        .map_or(RelatedType::Generic, RelatedType::Known),
                }),
                Some(FieldKind::ManyToMany { target } | FieldKind::OneToMany { target, .. }) => {
                    Ok(FieldClass::ToMany {
                        related: target.clone(),
                    })
                }
                None => Err(SyncError::configuration(
                    model,
                    format!("`{field}` does not exist on {}", schema.type_key),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        let store = Store::open_in_memory();
        store
            .register_schema(SchemaDef::new(TypeKey::new("dcim", "location")).unique_column("name"))
            .unwrap();
        store
            .register_schema(SchemaDef::new(TypeKey::new("extras", "tag")).unique_column("name"))
            .unwrap();
        store
            .register_schema(
                SchemaDef::new(TypeKey::new("dcim", "device"))
                    .unique_column("name")
                    .column("serial")
                    .nullable_foreign_key("location", TypeKey::new("dcim", "location"))
                    .generic_foreign_key("assigned_object")
                    .many_to_many("tags", TypeKey::new("extras", "tag"))
                    .custom_field("owner"),
            )
            .unwrap();
        store
    }

    fn device() -> ModelDescriptorBuilder {
        ModelDescriptor::builder("device", TypeKey::new("dcim", "device")).identifier("name")
    }

    #[test]
    fn classification_table() {
        let model = ModelType::bind(
            device()
                .attribute("serial")
                .attribute("location__name")
                .attribute("tags")
                .attribute("owner")
                .attribute("tenant__name")
                .attribute("monitors")
                .custom_field("owner", "owner")
                .custom_relationship("tenant__name", "device_tenant", RelationshipSide::Source)
                .custom_relationship("monitors", "device_monitors", RelationshipSide::Destination)
                .build(),
            &store(),
        )
        .unwrap();

        assert_eq!(model.class_of("serial").unwrap(), &FieldClass::Scalar);
        assert_eq!(
            model.class_of("location__name").unwrap(),
            &FieldClass::ForeignKey {
                field: "location".into(),
                path: "name".into(),
                related: RelatedType::Known(TypeKey::new("dcim", "location")),
            }
        );
        assert!(matches!(model.class_of("tags").unwrap(), FieldClass::ToMany { .. }));
        assert!(matches!(model.class_of("owner").unwrap(), FieldClass::CustomScalar { .. }));
        assert!(matches!(
            model.class_of("tenant__name").unwrap(),
            FieldClass::CustomForeignKey { field, .. } if field == "tenant"
        ));
        assert!(matches!(model.class_of("monitors").unwrap(), FieldClass::CustomToMany { .. }));
    }

    #[test]
    fn undeclared_field_is_a_configuration_error() {
        let model = ModelType::bind(device().build(), &store()).unwrap();
        let err = model.class_of("platform").unwrap_err();
        assert!(matches!(err, SyncError::Configuration { .. }));
        assert!(err.to_string().contains("not defined on the model"));
    }

    #[test]
    fn dotted_field_must_traverse_a_foreign_key() {
        let err = ModelType::bind(device().attribute("serial__name").build(), &store()).unwrap_err();
        assert!(err.to_string().contains("not a foreign key"));
    }

    #[test]
    fn unknown_native_field_is_rejected() {
        let err = ModelType::bind(device().attribute("platform").build(), &store()).unwrap_err();
        assert!(matches!(err, SyncError::Configuration { .. }));
    }

    #[test]
    fn generic_companions_classify_as_generic_foreign_key() {
        let model = ModelType::bind(
            device()
                .attribute("assigned_object__app_label")
                .attribute("assigned_object__model")
                .attribute("assigned_object__name")
                .build(),
            &store(),
        )
        .unwrap();
        assert!(matches!(
            model.class_of("assigned_object__model").unwrap(),
            FieldClass::ForeignKey { related: RelatedType::Generic, .. }
        ));
    }

    #[test]
    fn identifier_lookup_and_unique_id() {
        let model = ModelType::bind(
            ModelDescriptor::builder("device", TypeKey::new("dcim", "device"))
                .identifier("name")
                .identifier("location__name")
                .identifier("owner")
                .custom_field("owner", "owner")
                .build(),
            &store(),
        )
        .unwrap();
        let ids: Params = [
            ("name".to_string(), Value::text("sw1")),
            ("location__name".to_string(), Value::text("dc1")),
            ("owner".to_string(), Value::text("ops")),
        ]
        .into_iter()
        .collect();

        let lookup = model.identifier_lookup(&ids).unwrap();
        assert_eq!(lookup.get("cf__owner"), Some(&Value::text("ops")));
        assert_eq!(lookup.get("location__name"), Some(&Value::text("dc1")));
        assert_eq!(model.unique_id(&ids), "sw1__dc1__ops");
    }

    #[test]
    fn to_many_identifier_is_rejected() {
        let err = ModelType::bind(
            ModelDescriptor::builder("device", TypeKey::new("dcim", "device"))
                .identifier("tags")
                .build(),
            &store(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unique lookup"));
    }

    #[test]
    fn default_lookup_keys() {
        let model = ModelType::bind(
            device().attribute("tags").lookup_keys("other", ["slug"]).build(),
            &store(),
        )
        .unwrap();
        assert_eq!(model.lookup_keys("tags"), vec!["name"]);
        assert_eq!(model.lookup_keys("other"), vec!["slug"]);
    }
}
