//! Schema definitions and introspection types.
//!
//! A [`SchemaDef`] describes one relational type: its native columns, its
//! foreign keys (including generic keys that may point at any type), its
//! many-to-many associations and the reverse side of foreign keys declared
//! on other types.

use crate::types::TypeKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Storage kind of a schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// A native scalar column.
    Column {
        /// Whether a non-empty value is required on save.
        #[serde(default)]
        required: bool,
        /// Whether values must be unique across the type.
        #[serde(default)]
        unique: bool,
    },
    /// A foreign key to a single entity.
    ForeignKey {
        /// The related type, or `None` for a generic key.
        target: Option<TypeKey>,
        /// Whether the key may be unset.
        #[serde(default)]
        nullable: bool,
    },
    /// A many-to-many association.
    ManyToMany {
        /// The related type.
        target: TypeKey,
    },
    /// The reverse side of a foreign key declared on `target`.
    OneToMany {
        /// The type holding the foreign key.
        target: TypeKey,
        /// The foreign key field on `target` pointing back here.
        remote_field: String,
    },
}

/// Cardinality of a relation field, as seen from the owning type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Plain column.
    Scalar,
    /// Single-valued foreign key.
    ForeignKey,
    /// Many-to-many.
    ManyToMany,
    /// Reverse foreign key.
    OneToMany,
}

/// A single field of a schema type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Storage kind.
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDef {
    /// Returns the field's cardinality.
    pub fn cardinality(&self) -> Cardinality {
        match self.kind {
            FieldKind::Column { .. } => Cardinality::Scalar,
            FieldKind::ForeignKey { .. } => Cardinality::ForeignKey,
            FieldKind::ManyToMany { .. } => Cardinality::ManyToMany,
            FieldKind::OneToMany { .. } => Cardinality::OneToMany,
        }
    }

    /// Returns true for many-to-many and reverse foreign key fields.
    pub fn is_to_many(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::ManyToMany { .. } | FieldKind::OneToMany { .. }
        )
    }

    /// Returns the related type for relation fields.
    ///
    /// Generic foreign keys and columns return `None`.
    pub fn related_type(&self) -> Option<&TypeKey> {
        match &self.kind {
            FieldKind::Column { .. } => None,
            FieldKind::ForeignKey { target, .. } => target.as_ref(),
            FieldKind::ManyToMany { target } | FieldKind::OneToMany { target, .. } => Some(target),
        }
    }
}

/// Definition of a schema type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDef {
    /// The type key under which the schema is registered.
    pub type_key: TypeKey,
    /// Declared fields, in declaration order.
    pub fields: Vec<FieldDef>,
    /// Groups of fields whose combined values must be unique.
    #[serde(default)]
    pub unique_together: Vec<Vec<String>>,
    /// Names accepted in the entity's custom-field store.
    #[serde(default)]
    pub custom_fields: BTreeSet<String>,
}

impl SchemaDef {
    /// Starts a schema definition for the given type.
    pub fn new(type_key: TypeKey) -> Self {
        Self {
            type_key,
            fields: Vec::new(),
            unique_together: Vec::new(),
            custom_fields: BTreeSet::new(),
        }
    }

    /// Adds an optional column.
    #[must_use]
    pub fn column(self, name: &str) -> Self {
        self.field(name, FieldKind::Column { required: false, unique: false })
    }

    /// Adds a required column.
    #[must_use]
    pub fn required_column(self, name: &str) -> Self {
        self.field(name, FieldKind::Column { required: true, unique: false })
    }

    /// Adds a required, unique column.
    #[must_use]
    pub fn unique_column(self, name: &str) -> Self {
        self.field(name, FieldKind::Column { required: true, unique: true })
    }

    /// Adds a required foreign key.
    #[must_use]
    pub fn foreign_key(self, name: &str, target: TypeKey) -> Self {
        self.field(
            name,
            FieldKind::ForeignKey {
                target: Some(target),
                nullable: false,
            },
        )
    }

    /// Adds a nullable foreign key.
    #[must_use]
    pub fn nullable_foreign_key(self, name: &str, target: TypeKey) -> Self {
        self.field(
            name,
            FieldKind::ForeignKey {
                target: Some(target),
                nullable: true,
            },
        )
    }

    /// Adds a nullable generic foreign key.
    #[must_use]
    pub fn generic_foreign_key(self, name: &str) -> Self {
        self.field(
            name,
            FieldKind::ForeignKey {
                target: None,
                nullable: true,
            },
        )
    }

    /// Adds a many-to-many field.
    #[must_use]
    pub fn many_to_many(self, name: &str, target: TypeKey) -> Self {
        self.field(name, FieldKind::ManyToMany { target })
    }

    /// Adds the reverse side of `target.remote_field`.
    #[must_use]
    pub fn one_to_many(self, name: &str, target: TypeKey, remote_field: &str) -> Self {
        self.field(
            name,
            FieldKind::OneToMany {
                target,
                remote_field: remote_field.to_string(),
            },
        )
    }

    /// Requires the combination of `fields` to be unique.
    #[must_use]
    pub fn unique_together(mut self, fields: &[&str]) -> Self {
        self.unique_together
            .push(fields.iter().map(|f| (*f).to_string()).collect());
        self
    }

    /// Accepts `name` in the custom-field store.
    #[must_use]
    pub fn custom_field(mut self, name: &str) -> Self {
        self.custom_fields.insert(name.to_string());
        self
    }

    /// Adds a field of arbitrary kind.
    #[must_use]
    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            kind,
        });
        self
    }

    /// Looks up a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns true if `name` is a field of this type or the implicit `id`.
    pub fn has_field(&self, name: &str) -> bool {
        name == "id" || self.get_field(name).is_some()
    }

    /// Returns the names of all declared fields, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_schema() -> SchemaDef {
        SchemaDef::new(TypeKey::new("dcim", "device"))
            .unique_column("name")
            .column("serial")
            .foreign_key("location", TypeKey::new("dcim", "location"))
            .many_to_many("tags", TypeKey::new("extras", "tag"))
            .one_to_many("interfaces", TypeKey::new("dcim", "interface"), "device")
    }

    #[test]
    fn field_introspection() {
        let schema = device_schema();
        assert!(schema.has_field("id"));
        assert!(schema.has_field("serial"));
        assert!(!schema.has_field("platform"));

        let location = schema.get_field("location").unwrap();
        assert_eq!(location.cardinality(), Cardinality::ForeignKey);
        assert_eq!(
            location.related_type(),
            Some(&TypeKey::new("dcim", "location"))
        );

        assert!(schema.get_field("tags").unwrap().is_to_many());
        assert!(schema.get_field("interfaces").unwrap().is_to_many());
        assert!(!schema.get_field("name").unwrap().is_to_many());
    }

    #[test]
    fn generic_key_has_no_related_type() {
        let schema = SchemaDef::new(TypeKey::new("extras", "note")).generic_foreign_key("assigned_object");
        assert!(schema.get_field("assigned_object").unwrap().related_type().is_none());
    }

    #[test]
    fn schema_json_roundtrip() {
        let schema = device_schema().custom_field("system_of_record");
        let json = serde_json::to_string(&schema).unwrap();
        let back: SchemaDef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
