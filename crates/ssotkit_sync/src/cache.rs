//! Per-pass relationship cache.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use ssotkit_store::{Relationship, Store, StoreError};
use std::collections::HashMap;

/// Relationship metadata resolved during one synchronization pass.
///
/// Entries are loaded from the store the first time a label is requested
/// and are never invalidated while the pass runs. Call [`clear`] between
/// passes.
///
/// [`clear`]: RelationshipCache::clear
#[derive(Debug, Default)]
pub struct RelationshipCache {
    entries: RwLock<HashMap<String, Relationship>>,
}

impl RelationshipCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the relationship labelled `label`, loading it on first use.
    ///
    /// # Errors
    ///
    /// `Configuration` naming `model` if no such relationship exists.
    pub fn get(&self, store: &Store, model: &str, label: &str) -> SyncResult<Relationship> {
        if let Some(relationship) = self.entries.read().get(label) {
            return Ok(relationship.clone());
        }

        let relationship = store.relationship(label).map_err(|e| match e {
            StoreError::RelationshipNotFound { .. } => SyncError::configuration(model, e.to_string()),
            other => SyncError::Store(other),
        })?;
        self.entries
            .write()
            .entry(label.to_string())
            .or_insert_with(|| relationship.clone());
        Ok(relationship)
    }

    /// Returns the number of cached relationships.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
