//! Lookup parameters for filtering and unique lookups.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Separator between path segments in a lookup or model field name.
pub const PATH_SEPARATOR: &str = "__";

/// Ordered mapping of field paths to expected values.
///
/// A path is a column name, `id`, a foreign key name (matched against the
/// referenced id), `cf__<name>` for the custom-field store, or a dotted path
/// `fk__rest` that traverses a relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lookup(BTreeMap<String, Value>);

impl Lookup {
    /// Creates an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition, builder style.
    #[must_use]
    pub fn with(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(path, value);
        self
    }

    /// Adds or replaces a condition.
    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(path.into(), value.into());
    }

    /// Removes a condition, returning its value.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        self.0.remove(path)
    }

    /// Gets the expected value for a path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.0.get(path)
    }

    /// Returns true if there are no conditions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of conditions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if every expected value is empty (see [`Value::is_empty`]).
    pub fn all_values_empty(&self) -> bool {
        self.0.values().all(Value::is_empty)
    }

    /// Iterates over the conditions in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (path, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{path:?}: {value}")?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(String, Value)> for Lookup {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for Lookup {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl IntoIterator for Lookup {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Splits `path` at the first separator into head and remaining path.
pub fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once(PATH_SEPARATOR) {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_paths_and_values() {
        let lookup = Lookup::new().with("name", "dc1").with("parent__name", "emea");
        assert_eq!(lookup.to_string(), r#"{"name": "dc1", "parent__name": "emea"}"#);
    }

    #[test]
    fn all_values_empty() {
        assert!(Lookup::new().with("name", Value::Null).with("slug", "").all_values_empty());
        assert!(!Lookup::new().with("name", Value::Null).with("slug", "x").all_values_empty());
        assert!(!Lookup::new().with("vid", 0i64).with("active", false).all_values_empty());
    }

    #[test]
    fn split_path_first_segment_only() {
        assert_eq!(split_path("tenant__group__name"), ("tenant", Some("group__name")));
        assert_eq!(split_path("name"), ("name", None));
    }
}
