//! Store statistics.
//!
//! Operation counters are atomic and can be read while a synchronization
//! pass is running. [`crate::Store::stats`] combines them with the current
//! table sizes into a serializable [`StatsSnapshot`].

use crate::types::TypeKey;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters for a store.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Unique lookups and filters.
    lookups: AtomicU64,
    /// Entity saves (insert or update).
    saves: AtomicU64,
    /// Entity deletes.
    deletes: AtomicU64,
    /// To-many set replacements.
    relation_sets: AtomicU64,
    /// Relationship associations created or updated.
    association_writes: AtomicU64,
    /// Relationship associations deleted.
    association_deletes: AtomicU64,
    /// Transactions committed.
    commits: AtomicU64,
    /// Transactions rolled back.
    rollbacks: AtomicU64,
}

impl StoreStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_save(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_relation_set(&self) {
        self.relation_sets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_association_write(&self) {
        self.association_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_association_delete(&self) {
        self.association_deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all counters into a snapshot with empty table sizes.
    pub fn counters(&self) -> StatsSnapshot {
        StatsSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            relation_sets: self.relation_sets.load(Ordering::Relaxed),
            association_writes: self.association_writes.load(Ordering::Relaxed),
            association_deletes: self.association_deletes.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            ..StatsSnapshot::default()
        }
    }
}

/// Point-in-time view of store counters and table sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Unique lookups and filters.
    pub lookups: u64,
    /// Entity saves.
    pub saves: u64,
    /// Entity deletes.
    pub deletes: u64,
    /// To-many set replacements.
    pub relation_sets: u64,
    /// Associations created or updated.
    pub association_writes: u64,
    /// Associations deleted.
    pub association_deletes: u64,
    /// Transactions committed.
    pub commits: u64,
    /// Transactions rolled back.
    pub rollbacks: u64,
    /// Row count per type.
    pub rows: BTreeMap<TypeKey, usize>,
    /// Total many-to-many links.
    pub links: usize,
    /// Registered relationships.
    pub relationships: usize,
    /// Stored relationship associations.
    pub associations: usize,
}
