//! Stored entity rows.

use crate::entity::ObjectId;
use crate::types::{ObjectRef, TypeKey};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A relational row of a concrete schema type.
///
/// Native columns, foreign keys and the generic custom-field store are kept
/// apart so that validation and lookups can treat each according to its
/// storage semantics. Many-to-many and reverse foreign key sets live in the
/// store, not on the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Primary key.
    pub id: ObjectId,
    /// Schema type of the row.
    pub type_key: TypeKey,
    /// Native column values.
    #[serde(default)]
    pub columns: BTreeMap<String, Value>,
    /// Foreign key values; `None` means the key is explicitly unset.
    #[serde(default)]
    pub foreign_keys: BTreeMap<String, Option<ObjectRef>>,
    /// Generic per-entity key/value custom-field store.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, Value>,
}

impl Entity {
    /// Instantiates a new, unsaved entity with a fresh primary key.
    pub fn new(type_key: TypeKey) -> Self {
        Self {
            id: ObjectId::new(),
            type_key,
            columns: BTreeMap::new(),
            foreign_keys: BTreeMap::new(),
            custom_fields: BTreeMap::new(),
        }
    }

    /// Returns a reference to this entity.
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.type_key.clone(), self.id)
    }

    /// Gets a column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Sets a column value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Gets the target of a foreign key, if set.
    pub fn foreign_key(&self, field: &str) -> Option<&ObjectRef> {
        self.foreign_keys.get(field).and_then(Option::as_ref)
    }

    /// Sets or clears a foreign key.
    pub fn set_foreign_key(&mut self, field: impl Into<String>, target: Option<ObjectRef>) {
        self.foreign_keys.insert(field.into(), target);
    }

    /// Gets a custom field value.
    pub fn custom_field(&self, name: &str) -> Option<&Value> {
        self.custom_fields.get(name)
    }

    /// Sets a custom field value.
    pub fn set_custom_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.custom_fields.insert(name.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entity_has_fresh_id() {
        let key = TypeKey::new("dcim", "device");
        let a = Entity::new(key.clone());
        let b = Entity::new(key);
        assert_ne!(a.id, b.id);
        assert!(a.columns.is_empty());
    }

    #[test]
    fn foreign_key_accessors() {
        let mut device = Entity::new(TypeKey::new("dcim", "device"));
        let location = Entity::new(TypeKey::new("dcim", "location"));

        assert!(device.foreign_key("location").is_none());
        device.set_foreign_key("location", Some(location.object_ref()));
        assert_eq!(device.foreign_key("location").unwrap().id, location.id);

        device.set_foreign_key("location", None);
        assert!(device.foreign_key("location").is_none());
        assert!(device.foreign_keys.contains_key("location"));
    }

    #[test]
    fn custom_fields_are_separate_from_columns() {
        let mut device = Entity::new(TypeKey::new("dcim", "device"));
        device.set_custom_field("system_of_record", "librenms");
        assert!(device.get("system_of_record").is_none());
        assert_eq!(
            device.custom_field("system_of_record"),
            Some(&Value::text("librenms"))
        );
    }
}
