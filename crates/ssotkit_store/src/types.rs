//! Core type definitions for the store.

use crate::entity::ObjectId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of a schema type in the type registry.
///
/// A type key is the pair `(namespace, name)`, e.g. `dcim.device`. Names are
/// stored lowercase so registry lookups are case-insensitive on the name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey {
    namespace: String,
    name: String,
}

impl TypeKey {
    /// Creates a new type key.
    pub fn new(namespace: impl Into<String>, name: impl AsRef<str>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.as_ref().to_lowercase(),
        }
    }

    /// Returns the namespace (application label).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the type name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Error returned when a string is not of the form `namespace.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTypeKeyError(String);

impl fmt::Display for ParseTypeKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid type key {:?}: expected `namespace.name`", self.0)
    }
}

impl std::error::Error for ParseTypeKeyError {}

impl FromStr for TypeKey {
    type Err = ParseTypeKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                Ok(Self::new(namespace, name))
            }
            _ => Err(ParseTypeKeyError(s.to_string())),
        }
    }
}

impl Serialize for TypeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TypeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A typed reference to a stored entity.
///
/// Foreign keys hold an `ObjectRef` so that generic (polymorphic) keys can
/// point at entities of any registered type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Type of the referenced entity.
    pub type_key: TypeKey,
    /// Primary key of the referenced entity.
    pub id: ObjectId,
}

impl ObjectRef {
    /// Creates a new object reference.
    pub fn new(type_key: TypeKey, id: ObjectId) -> Self {
        Self { type_key, id }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_key, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_key_name_is_lowercased() {
        let key = TypeKey::new("dcim", "LocationType");
        assert_eq!(key.name(), "locationtype");
        assert_eq!(key, TypeKey::new("dcim", "locationtype"));
    }

    #[test]
    fn type_key_display_and_parse() {
        let key = TypeKey::new("dcim", "device");
        assert_eq!(format!("{key}"), "dcim.device");
        assert_eq!("dcim.device".parse::<TypeKey>().unwrap(), key);
        assert!("device".parse::<TypeKey>().is_err());
        assert!(".device".parse::<TypeKey>().is_err());
    }

    #[test]
    fn type_key_serializes_as_string() {
        let key = TypeKey::new("extras", "status");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"extras.status\"");
        let back: TypeKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
