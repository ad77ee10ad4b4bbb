//! Field annotations.
//!
//! Annotations tag fields of a model whose storage is not a native column:
//! values kept in the entity's custom-field store, and relations stored as
//! relationship associations.

use ssotkit_store::RelationshipSide;

/// Marks a field as a custom scalar stored under `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFieldAnnotation {
    /// Key in the custom-field store.
    pub name: String,
}

impl CustomFieldAnnotation {
    /// Creates a custom field annotation.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Marks a field as backed by relationship associations.
///
/// `side` is the end the annotated model sits on: with `Source`, the model's
/// entity is the association's source and the field's values are looked up
/// among the relationship's destination type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomRelationshipAnnotation {
    /// Relationship label.
    pub name: String,
    /// Side of the annotated model.
    pub side: RelationshipSide,
}

impl CustomRelationshipAnnotation {
    /// Creates a custom relationship annotation.
    pub fn new(name: impl Into<String>, side: RelationshipSide) -> Self {
        Self {
            name: name.into(),
            side,
        }
    }

    /// Side on which related objects are found.
    pub fn far_side(&self) -> RelationshipSide {
        self.side.opposite()
    }
}
