//! Named relationships and relationship associations.
//!
//! Relations that are not modelled as native columns are stored as
//! [`RelationshipAssociation`] rows: typed edges between a source entity and
//! a destination entity, grouped under a named [`Relationship`].

use crate::entity::ObjectId;
use crate::types::TypeKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cardinality of a named relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    /// Each source relates to at most one destination and vice versa.
    OneToOne,
    /// Each destination relates to at most one source.
    OneToMany,
    /// No cardinality restriction.
    ManyToMany,
}

/// One end of a relationship association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipSide {
    /// The source end.
    Source,
    /// The destination end.
    Destination,
}

impl RelationshipSide {
    /// Returns the opposite side.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Source => Self::Destination,
            Self::Destination => Self::Source,
        }
    }
}

impl fmt::Display for RelationshipSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// Metadata of a named relationship type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique label.
    pub label: String,
    /// Type of the source end.
    pub source_type: TypeKey,
    /// Type of the destination end.
    pub destination_type: TypeKey,
    /// Cardinality.
    pub kind: RelationshipKind,
}

impl Relationship {
    /// Creates a relationship definition.
    pub fn new(
        label: impl Into<String>,
        source_type: TypeKey,
        destination_type: TypeKey,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            label: label.into(),
            source_type,
            destination_type,
            kind,
        }
    }

    /// Returns the type of the given end.
    pub fn type_of(&self, side: RelationshipSide) -> &TypeKey {
        match side {
            RelationshipSide::Source => &self.source_type,
            RelationshipSide::Destination => &self.destination_type,
        }
    }
}

/// A typed edge between two entities under a named relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipAssociation {
    /// Primary key.
    pub id: ObjectId,
    /// Label of the relationship.
    pub relationship: String,
    /// Source type.
    pub source_type: TypeKey,
    /// Destination type.
    pub destination_type: TypeKey,
    /// Source entity.
    pub source_id: ObjectId,
    /// Destination entity.
    pub destination_id: ObjectId,
}

impl RelationshipAssociation {
    /// Returns the entity id at the given end.
    pub fn endpoint(&self, side: RelationshipSide) -> ObjectId {
        match side {
            RelationshipSide::Source => self.source_id,
            RelationshipSide::Destination => self.destination_id,
        }
    }
}

/// Filter over relationship associations.
///
/// Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationFilter {
    /// Relationship label.
    pub relationship: Option<String>,
    /// Source entity.
    pub source_id: Option<ObjectId>,
    /// Destination entity.
    pub destination_id: Option<ObjectId>,
}

impl AssociationFilter {
    /// Matches every association of the relationship.
    pub fn relationship(label: impl Into<String>) -> Self {
        Self {
            relationship: Some(label.into()),
            ..Self::default()
        }
    }

    /// Restricts the given end to `id`.
    #[must_use]
    pub fn with_endpoint(mut self, side: RelationshipSide, id: ObjectId) -> Self {
        match side {
            RelationshipSide::Source => self.source_id = Some(id),
            RelationshipSide::Destination => self.destination_id = Some(id),
        }
        self
    }

    /// Returns true if the association satisfies every set criterion.
    pub fn matches(&self, association: &RelationshipAssociation) -> bool {
        self.relationship
            .as_ref()
            .map_or(true, |label| *label == association.relationship)
            && self
                .source_id
                .map_or(true, |id| id == association.source_id)
            && self
                .destination_id
                .map_or(true, |id| id == association.destination_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn association(label: &str, source: ObjectId, destination: ObjectId) -> RelationshipAssociation {
        RelationshipAssociation {
            id: ObjectId::new(),
            relationship: label.into(),
            source_type: TypeKey::new("dcim", "location"),
            destination_type: TypeKey::new("dcim", "device"),
            source_id: source,
            destination_id: destination,
        }
    }

    #[test]
    fn side_opposite() {
        assert_eq!(RelationshipSide::Source.opposite(), RelationshipSide::Destination);
        assert_eq!(RelationshipSide::Destination.opposite(), RelationshipSide::Source);
    }

    #[test]
    fn filter_by_fixed_endpoint() {
        let (a, b, c) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        let ab = association("monitors", a, b);
        let cb = association("monitors", c, b);
        let other = association("backup", a, b);

        let filter =
            AssociationFilter::relationship("monitors").with_endpoint(RelationshipSide::Source, a);
        assert!(filter.matches(&ab));
        assert!(!filter.matches(&cb));
        assert!(!filter.matches(&other));

        let by_destination = AssociationFilter::relationship("monitors")
            .with_endpoint(RelationshipSide::Destination, b);
        assert!(by_destination.matches(&ab));
        assert!(by_destination.matches(&cb));
        assert_eq!(ab.endpoint(RelationshipSide::Destination), b);
    }
}
