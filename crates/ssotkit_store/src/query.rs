//! Read queries with eager loading.

use crate::entity::Entity;
use crate::lookup::Lookup;
use crate::types::TypeKey;
use crate::value::Value;
use std::collections::BTreeMap;

/// A query over all rows of a type, optionally filtered, with eager-load hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// The queried type.
    pub type_key: TypeKey,
    /// Filter conditions; empty selects every row.
    pub filter: Lookup,
    /// Relation fields whose targets are loaded together with each row.
    pub prefetch: Vec<String>,
}

impl Query {
    /// Selects every row of `type_key`.
    pub fn all(type_key: TypeKey) -> Self {
        Self {
            type_key,
            filter: Lookup::new(),
            prefetch: Vec::new(),
        }
    }

    /// Adds a filter condition.
    #[must_use]
    pub fn filter(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(path, value);
        self
    }

    /// Adds eager-load hints. Duplicate hints are ignored.
    #[must_use]
    pub fn prefetch_related<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !self.prefetch.contains(&field) {
                self.prefetch.push(field);
            }
        }
        self
    }
}

/// A row returned by [`crate::Store::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// The row itself.
    pub entity: Entity,
    /// Prefetched foreign key targets, by field. Unset keys are absent.
    pub related: BTreeMap<String, Entity>,
    /// Prefetched to-many sets, by field.
    pub related_sets: BTreeMap<String, Vec<Entity>>,
}

impl Row {
    /// Wraps an entity with no prefetched relations.
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            related: BTreeMap::new(),
            related_sets: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefetch_hints_are_deduplicated() {
        let query = Query::all(TypeKey::new("dcim", "device"))
            .prefetch_related(["location", "status"])
            .prefetch_related(["location"]);
        assert_eq!(query.prefetch, vec!["location", "status"]);
    }

    #[test]
    fn filter_builder() {
        let query = Query::all(TypeKey::new("dcim", "device")).filter("status__name", "Active");
        assert_eq!(query.filter.get("status__name"), Some(&Value::text("Active")));
    }
}
