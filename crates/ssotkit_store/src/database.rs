//! Store facade.

use crate::config::StoreConfig;
use crate::entity::{Entity, ObjectId};
use crate::error::{StoreError, StoreResult};
use crate::lookup::Lookup;
use crate::query::{Query, Row};
use crate::relationship::{
    AssociationFilter, Relationship, RelationshipAssociation, RelationshipSide,
};
use crate::schema::{Cardinality, FieldKind, SchemaDef};
use crate::snapshot;
use crate::stats::{StatsSnapshot, StoreStats};
use crate::tables::{RelationChange, Tables};
use crate::types::{ObjectRef, TypeKey};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The backing relational store.
///
/// `Store` owns the type registry, every entity row, many-to-many links,
/// named relationships and their associations. It enforces the relational
/// rules a source-of-truth database would: unique columns, required fields,
/// foreign key existence, protected deletes and association cardinality.
///
/// # Opening a Store
///
/// ```rust,ignore
/// use ssotkit_store::Store;
/// use std::path::Path;
///
/// let store = Store::open(Path::new("ssot.json"))?;
/// // ... register schemas, read and write ...
/// store.save_snapshot()?;
/// ```
///
/// For tests, use `Store::open_in_memory()`.
///
/// # Transactions
///
/// [`Store::begin`] takes a savepoint of the whole table set;
/// [`Store::rollback`] restores it and [`Store::commit`] discards it.
/// Savepoints nest.
pub struct Store {
    config: StoreConfig,
    /// Snapshot path. None for in-memory stores.
    path: Option<PathBuf>,
    tables: RwLock<Tables>,
    savepoints: Mutex<Vec<Tables>>,
    stats: StoreStats,
}

impl Store {
    /// Opens an empty in-memory store.
    pub fn open_in_memory() -> Self {
        Self::with_tables(StoreConfig::default(), None, Tables::default())
    }

    /// Opens a store backed by a JSON snapshot at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read or is of a newer
    /// format version, or if the configuration forbids opening it.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens a store backed by a JSON snapshot with custom configuration.
    ///
    /// A missing snapshot yields an empty store; nothing is written until
    /// [`Store::save_snapshot`] is called.
    pub fn open_with_config(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        let tables = if path.exists() {
            if config.error_if_exists {
                return Err(StoreError::invalid_operation(format!(
                    "snapshot already exists: {}",
                    path.display()
                )));
            }
            snapshot::read(path, config.format_version)?
        } else if config.create_if_missing {
            Tables::default()
        } else {
            return Err(StoreError::invalid_operation(format!(
                "snapshot does not exist: {}",
                path.display()
            )));
        };
        debug!(path = %path.display(), types = tables.schemas.len(), "opened store");
        Ok(Self::with_tables(config, Some(path.to_path_buf()), tables))
    }

    fn with_tables(config: StoreConfig, path: Option<PathBuf>, tables: Tables) -> Self {
        Self {
            config,
            path,
            tables: RwLock::new(tables),
            savepoints: Mutex::new(Vec::new()),
            stats: StoreStats::new(),
        }
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the snapshot path, if the store is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the current tables to the store's snapshot path.
    pub fn save_snapshot(&self) -> StoreResult<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| StoreError::invalid_operation("in-memory store has no snapshot path"))?;
        self.save_snapshot_to(path)
    }

    /// Writes the current tables to `path`.
    pub fn save_snapshot_to(&self, path: &Path) -> StoreResult<()> {
        let tables = self.tables.read();
        snapshot::write(
            path,
            &tables,
            self.config.format_version,
            self.config.pretty_snapshots,
        )?;
        debug!(path = %path.display(), "wrote snapshot");
        Ok(())
    }

    // === Type registry ===

    /// Registers or replaces a schema type.
    pub fn register_schema(&self, schema: SchemaDef) -> StoreResult<()> {
        debug!(type_key = %schema.type_key, "registering schema");
        self.tables.write().register_schema(schema)
    }

    /// Returns the schema of a registered type.
    pub fn schema(&self, type_key: &TypeKey) -> StoreResult<SchemaDef> {
        self.tables.read().schema(type_key).cloned()
    }

    /// Returns every registered schema, ordered by type key.
    pub fn schemas(&self) -> Vec<SchemaDef> {
        self.tables.read().schemas.values().cloned().collect()
    }

    /// Returns true if the type is registered.
    pub fn has_type(&self, type_key: &TypeKey) -> bool {
        self.tables.read().schemas.contains_key(type_key)
    }

    /// Resolves a `(namespace, name)` pair against the type registry.
    ///
    /// The name is matched case-insensitively.
    pub fn resolve_type(&self, namespace: &str, name: &str) -> StoreResult<TypeKey> {
        self.tables.read().resolve_type(namespace, name)
    }

    // === Reads ===

    /// Fetches the single row matching `lookup`.
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing matches, `MultipleFound` when more than one
    /// row matches.
    pub fn get(&self, type_key: &TypeKey, lookup: &Lookup) -> StoreResult<Entity> {
        self.stats.record_lookup();
        self.tables.read().get_unique(type_key, lookup).cloned()
    }

    /// Fetches a row by primary key.
    pub fn get_by_id(&self, type_key: &TypeKey, id: ObjectId) -> StoreResult<Entity> {
        self.stats.record_lookup();
        self.tables.read().row(type_key, id).cloned()
    }

    /// Fetches the row an [`ObjectRef`] points at.
    pub fn get_ref(&self, target: &ObjectRef) -> StoreResult<Entity> {
        self.get_by_id(&target.type_key, target.id)
    }

    /// Returns every row matching `lookup`, ordered by primary key.
    pub fn filter(&self, type_key: &TypeKey, lookup: &Lookup) -> StoreResult<Vec<Entity>> {
        self.stats.record_lookup();
        Ok(self
            .tables
            .read()
            .filter(type_key, lookup)?
            .into_iter()
            .cloned()
            .collect())
    }

    /// Returns every row of a type.
    pub fn all(&self, type_key: &TypeKey) -> StoreResult<Vec<Entity>> {
        self.filter(type_key, &Lookup::new())
    }

    /// Returns the number of rows of a type.
    pub fn count(&self, type_key: &TypeKey) -> StoreResult<usize> {
        Ok(self
            .tables
            .read()
            .rows
            .get(type_key)
            .ok_or_else(|| StoreError::UnknownType {
                type_key: type_key.to_string(),
            })?
            .len())
    }

    /// Runs a query, loading prefetched relations with each row.
    pub fn execute(&self, query: &Query) -> StoreResult<Vec<Row>> {
        self.stats.record_lookup();
        let tables = self.tables.read();
        let schema = tables.schema(&query.type_key)?;
        for hint in &query.prefetch {
            if schema.get_field(hint).map_or(true, |f| matches!(f.kind, FieldKind::Column { .. })) {
                return Err(StoreError::invalid_operation(format!(
                    "cannot prefetch `{hint}` on {}: not a relation field",
                    query.type_key
                )));
            }
        }

        let mut rows = Vec::new();
        for entity in tables.filter(&query.type_key, &query.filter)? {
            let mut row = Row::new(entity.clone());
            for hint in &query.prefetch {
                if let Some(target) = entity.foreign_key(hint) {
                    row.related
                        .insert(hint.clone(), tables.row(&target.type_key, target.id)?.clone());
                } else if let Some(target_type) = schema
                    .get_field(hint)
                    .filter(|f| f.is_to_many())
                    .and_then(|f| f.related_type())
                {
                    let mut set = Vec::new();
                    for id in tables.related_ids(&query.type_key, hint, entity.id)? {
                        set.push(tables.row(target_type, id)?.clone());
                    }
                    row.related_sets.insert(hint.clone(), set);
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Returns the ids currently in a to-many set.
    pub fn related_ids(
        &self,
        type_key: &TypeKey,
        field: &str,
        owner: ObjectId,
    ) -> StoreResult<Vec<ObjectId>> {
        self.tables.read().related_ids(type_key, field, owner)
    }

    /// Returns the rows currently in a to-many set.
    pub fn related(&self, type_key: &TypeKey, field: &str, owner: ObjectId) -> StoreResult<Vec<Entity>> {
        let tables = self.tables.read();
        let target = tables
            .field(type_key, field)?
            .related_type()
            .cloned()
            .ok_or_else(|| StoreError::unknown_field(type_key, field))?;
        tables
            .related_ids(type_key, field, owner)?
            .into_iter()
            .map(|id| tables.row(&target, id).cloned())
            .collect()
    }

    // === Writes ===

    /// Validates and persists a row. Returns true if the row was inserted.
    ///
    /// # Errors
    ///
    /// `Validation` with every rejected value when the row violates a
    /// uniqueness, required-field, foreign key or custom-field rule.
    pub fn save(&self, entity: &Entity) -> StoreResult<bool> {
        let inserted = self.tables.write().save(entity.clone())?;
        self.stats.record_save();
        debug!(type_key = %entity.type_key, id = %entity.id, inserted, "saved entity");
        Ok(inserted)
    }

    /// Deletes a row.
    ///
    /// Nullable foreign keys pointing at the row are cleared; a non-nullable
    /// reference makes the delete fail with `Protected`. Many-to-many links
    /// and relationship associations touching the row are removed.
    pub fn delete(&self, type_key: &TypeKey, id: ObjectId) -> StoreResult<()> {
        self.tables.write().delete(type_key, id)?;
        self.stats.record_delete();
        debug!(type_key = %type_key, id = %id, "deleted entity");
        Ok(())
    }

    /// Replaces a to-many set with exactly `targets`.
    ///
    /// Many-to-many fields replace their links. Reverse foreign key fields
    /// point each target's foreign key at the owner and clear it on targets
    /// that left the set.
    pub fn set_related(
        &self,
        type_key: &TypeKey,
        field: &str,
        owner: ObjectId,
        targets: &[ObjectId],
    ) -> StoreResult<RelationChange> {
        let mut tables = self.tables.write();
        let cardinality = tables.field(type_key, field)?.cardinality();
        let change = match cardinality {
            Cardinality::ManyToMany => tables.set_many_to_many(type_key, field, owner, targets)?,
            Cardinality::OneToMany => {
                tables.set_reverse_foreign_keys(type_key, field, owner, targets)?
            }
            _ => {
                return Err(StoreError::invalid_operation(format!(
                    "`{field}` on {type_key} is not a to-many field"
                )))
            }
        };
        self.stats.record_relation_set();
        debug!(
            type_key = %type_key,
            field,
            added = change.added.len(),
            removed = change.removed.len(),
            "set related"
        );
        Ok(change)
    }

    // === Relationships ===

    /// Registers or replaces a named relationship.
    pub fn register_relationship(&self, relationship: Relationship) -> StoreResult<()> {
        debug!(label = %relationship.label, "registering relationship");
        self.tables.write().register_relationship(relationship)
    }

    /// Looks up a relationship by label.
    pub fn relationship(&self, label: &str) -> StoreResult<Relationship> {
        self.tables.read().relationship(label).cloned()
    }

    /// Returns every registered relationship.
    pub fn relationships(&self) -> Vec<Relationship> {
        self.tables.read().relationships.values().cloned().collect()
    }

    /// Returns the associations matching `filter`.
    pub fn associations(&self, filter: &AssociationFilter) -> Vec<RelationshipAssociation> {
        self.tables
            .read()
            .find_associations(filter)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Returns the association between `source_id` and `destination_id`,
    /// creating it if absent. The flag is true if it was created.
    pub fn get_or_create_association(
        &self,
        label: &str,
        source_id: ObjectId,
        destination_id: ObjectId,
    ) -> StoreResult<(RelationshipAssociation, bool)> {
        let result = self
            .tables
            .write()
            .get_or_create_association(label, source_id, destination_id)?;
        if result.1 {
            self.stats.record_association_write();
        }
        Ok(result)
    }

    /// Points the single association anchored at `fixed_id` on `fixed_side`
    /// at `far_id`, creating it if none exists.
    ///
    /// # Errors
    ///
    /// `MultipleFound` if more than one association is anchored there.
    pub fn update_or_create_association(
        &self,
        label: &str,
        fixed_side: RelationshipSide,
        fixed_id: ObjectId,
        far_id: ObjectId,
    ) -> StoreResult<(RelationshipAssociation, bool)> {
        let mut tables = self.tables.write();
        let anchored = AssociationFilter::relationship(label).with_endpoint(fixed_side, fixed_id);
        let before = tables
            .find_associations(&anchored)
            .first()
            .map(|a| (a.source_id, a.destination_id));
        let result = tables.update_or_create_association(label, fixed_side, fixed_id, far_id)?;
        drop(tables);
        if result.1 || before != Some((result.0.source_id, result.0.destination_id)) {
            self.stats.record_association_write();
        }
        debug!(label, side = %fixed_side, created = result.1, "wrote association");
        Ok(result)
    }

    /// Deletes an association.
    pub fn delete_association(&self, id: ObjectId) -> StoreResult<()> {
        self.tables.write().delete_association(id)?;
        self.stats.record_association_delete();
        debug!(id = %id, "deleted association");
        Ok(())
    }

    // === Transactions ===

    /// Takes a savepoint.
    pub fn begin(&self) {
        let snapshot = self.tables.read().clone();
        let mut savepoints = self.savepoints.lock();
        savepoints.push(snapshot);
        debug!(depth = savepoints.len(), "transaction started");
    }

    /// Discards the innermost savepoint, keeping all changes.
    pub fn commit(&self) -> StoreResult<()> {
        let mut savepoints = self.savepoints.lock();
        savepoints
            .pop()
            .ok_or_else(|| StoreError::invalid_operation("commit without an open transaction"))?;
        self.stats.record_commit();
        debug!(depth = savepoints.len(), "transaction committed");
        Ok(())
    }

    /// Restores the innermost savepoint.
    pub fn rollback(&self) -> StoreResult<()> {
        let mut savepoints = self.savepoints.lock();
        let snapshot = savepoints
            .pop()
            .ok_or_else(|| StoreError::invalid_operation("rollback without an open transaction"))?;
        *self.tables.write() = snapshot;
        self.stats.record_rollback();
        debug!(depth = savepoints.len(), "transaction rolled back");
        Ok(())
    }

    /// Returns true while a savepoint is open.
    pub fn in_transaction(&self) -> bool {
        !self.savepoints.lock().is_empty()
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits if `f` returns `Ok`, rolls back otherwise.
    pub fn transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.begin();
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                self.rollback()?;
                Err(err)
            }
        }
    }

    // === Statistics ===

    /// Returns operation counters and current table sizes.
    pub fn stats(&self) -> StatsSnapshot {
        let tables = self.tables.read();
        let mut snapshot = self.stats.counters();
        snapshot.rows = tables
            .rows
            .iter()
            .map(|(key, rows)| (key.clone(), rows.len()))
            .collect();
        snapshot.links = tables
            .links
            .values()
            .flat_map(|fields| fields.values())
            .flat_map(|owners| owners.values())
            .map(|targets| targets.len())
            .sum();
        snapshot.relationships = tables.relationships.len();
        snapshot.associations = tables.associations.len();
        snapshot
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::RelationshipKind;
    use crate::value::Value;

    fn location_type() -> TypeKey {
        TypeKey::new("dcim", "location")
    }

    fn device_type() -> TypeKey {
        TypeKey::new("dcim", "device")
    }

    fn tag_type() -> TypeKey {
        TypeKey::new("extras", "tag")
    }

    fn store() -> Store {
        let store = Store::open_in_memory();
        store
            .register_schema(SchemaDef::new(tag_type()).unique_column("name"))
            .unwrap();
        store
            .register_schema(
                SchemaDef::new(location_type())
                    .required_column("name")
                    .nullable_foreign_key("parent", location_type())
                    .one_to_many("devices", device_type(), "location")
                    .unique_together(&["name", "parent"]),
            )
            .unwrap();
        store
            .register_schema(
                SchemaDef::new(device_type())
                    .unique_column("name")
                    .nullable_foreign_key("location", location_type())
                    .many_to_many("tags", tag_type())
                    .custom_field("system_of_record"),
            )
            .unwrap();
        store
    }

    fn insert(store: &Store, type_key: TypeKey, name: &str) -> Entity {
        let mut entity = Entity::new(type_key);
        entity.set("name", name);
        store.save(&entity).unwrap();
        entity
    }

    #[test]
    fn get_distinguishes_missing_and_ambiguous() {
        let store = store();
        let emea = insert(&store, location_type(), "emea");
        let mut child = Entity::new(location_type());
        child.set("name", "dc1");
        child.set_foreign_key("parent", Some(emea.object_ref()));
        store.save(&child).unwrap();
        insert(&store, location_type(), "dc1");

        let err = store
            .get(&location_type(), &Lookup::new().with("name", "dc9"))
            .unwrap_err();
        assert!(err.is_not_found());

        let err = store
            .get(&location_type(), &Lookup::new().with("name", "dc1"))
            .unwrap_err();
        assert!(err.is_multiple_found());

        let found = store
            .get(
                &location_type(),
                &Lookup::new().with("name", "dc1").with("parent__name", "emea"),
            )
            .unwrap();
        assert_eq!(found.id, child.id);
    }

    #[test]
    fn unique_column_is_enforced() {
        let store = store();
        insert(&store, device_type(), "sw1");
        let mut dup = Entity::new(device_type());
        dup.set("name", "sw1");
        let err = store.save(&dup).unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert!(err.to_string().contains("name already exists"));
    }

    #[test]
    fn validation_collects_every_message() {
        let store = store();
        let mut device = Entity::new(device_type());
        device.set_custom_field("owner", "ops");
        let err = store.save(&device).unwrap_err().to_string();
        assert!(err.contains("`name` is required"));
        assert!(err.contains("unknown custom field `owner`"));
    }

    #[test]
    fn foreign_key_must_reference_existing_row() {
        let store = store();
        let mut device = Entity::new(device_type());
        device.set("name", "sw1");
        device.set_foreign_key("location", Some(ObjectRef::new(location_type(), ObjectId::new())));
        assert!(store.save(&device).is_err());
    }

    #[test]
    fn delete_clears_nullable_references() {
        let store = store();
        let dc1 = insert(&store, location_type(), "dc1");
        let mut device = Entity::new(device_type());
        device.set("name", "sw1");
        device.set_foreign_key("location", Some(dc1.object_ref()));
        store.save(&device).unwrap();

        store.delete(&location_type(), dc1.id).unwrap();
        let device = store.get_by_id(&device_type(), device.id).unwrap();
        assert!(device.foreign_key("location").is_none());
    }

    #[test]
    fn delete_protected_by_required_reference() {
        let store = Store::open_in_memory();
        store
            .register_schema(SchemaDef::new(location_type()).required_column("name"))
            .unwrap();
        store
            .register_schema(
                SchemaDef::new(device_type())
                    .unique_column("name")
                    .foreign_key("location", location_type()),
            )
            .unwrap();
        let dc1 = insert(&store, location_type(), "dc1");
        let mut device = Entity::new(device_type());
        device.set("name", "sw1");
        device.set_foreign_key("location", Some(dc1.object_ref()));
        store.save(&device).unwrap();

        let err = store.delete(&location_type(), dc1.id).unwrap_err();
        assert!(matches!(err, StoreError::Protected { .. }));
        assert_eq!(store.count(&location_type()).unwrap(), 1);
    }

    #[test]
    fn many_to_many_set_replacement() {
        let store = store();
        let device = insert(&store, device_type(), "sw1");
        let a = insert(&store, tag_type(), "a");
        let b = insert(&store, tag_type(), "b");
        let c = insert(&store, tag_type(), "c");

        store.set_related(&device_type(), "tags", device.id, &[a.id, b.id]).unwrap();
        let change = store
            .set_related(&device_type(), "tags", device.id, &[b.id, c.id])
            .unwrap();
        assert_eq!(change.added, vec![c.id]);
        assert_eq!(change.removed, vec![a.id]);

        let mut names: Vec<_> = store
            .related(&device_type(), "tags", device.id)
            .unwrap()
            .into_iter()
            .map(|t| t.get("name").cloned().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec![Value::text("b"), Value::text("c")]);

        let tagged = store
            .filter(&device_type(), &Lookup::new().with("tags__name", "c"))
            .unwrap();
        assert_eq!(tagged.len(), 1);
    }

    #[test]
    fn reverse_foreign_key_set() {
        let store = store();
        let dc1 = insert(&store, location_type(), "dc1");
        let sw1 = insert(&store, device_type(), "sw1");
        let sw2 = insert(&store, device_type(), "sw2");

        store.set_related(&location_type(), "devices", dc1.id, &[sw1.id, sw2.id]).unwrap();
        store.set_related(&location_type(), "devices", dc1.id, &[sw2.id]).unwrap();

        assert!(store.get_by_id(&device_type(), sw1.id).unwrap().foreign_key("location").is_none());
        assert_eq!(
            store.get_by_id(&device_type(), sw2.id).unwrap().foreign_key("location").map(|r| r.id),
            Some(dc1.id)
        );
    }

    #[test]
    fn reverse_foreign_key_set_keeps_unique_together() {
        let interface_type = TypeKey::new("dcim", "interface");
        let store = Store::open_in_memory();
        store
            .register_schema(
                SchemaDef::new(device_type())
                    .unique_column("name")
                    .one_to_many("interfaces", interface_type.clone(), "device"),
            )
            .unwrap();
        store
            .register_schema(
                SchemaDef::new(interface_type.clone())
                    .required_column("name")
                    .nullable_foreign_key("device", device_type())
                    .unique_together(&["device", "name"]),
            )
            .unwrap();
        let interface = |device: Option<&Entity>, name: &str| {
            let mut row = Entity::new(interface_type.clone());
            row.set("name", name);
            row.set_foreign_key("device", device.map(Entity::object_ref));
            store.save(&row).unwrap();
            row
        };
        let a = insert(&store, device_type(), "a");
        let b = insert(&store, device_type(), "b");
        let a_eth0 = interface(Some(&a), "eth0");
        let b_eth0 = interface(Some(&b), "eth0");

        let err = store
            .set_related(&device_type(), "interfaces", b.id, &[a_eth0.id, b_eth0.id])
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert_eq!(
            store.get_by_id(&interface_type, a_eth0.id).unwrap().foreign_key("device").map(|r| r.id),
            Some(a.id)
        );
        let on_b = Lookup::new().with("device__name", "b").with("name", "eth0");
        assert_eq!(store.get(&interface_type, &on_b).unwrap().id, b_eth0.id);

        // Two unattached rows that would collide with each other.
        let loose1 = interface(None, "eth1");
        let loose2 = interface(None, "eth1");
        let err = store
            .set_related(&device_type(), "interfaces", a.id, &[a_eth0.id, loose1.id, loose2.id])
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert!(store.get_by_id(&interface_type, loose1.id).unwrap().foreign_key("device").is_none());
        assert_eq!(store.related_ids(&device_type(), "interfaces", a.id).unwrap(), vec![a_eth0.id]);
    }

    #[test]
    fn execute_prefetches_relations() {
        let store = store();
        let dc1 = insert(&store, location_type(), "dc1");
        let mut sw1 = Entity::new(device_type());
        sw1.set("name", "sw1");
        sw1.set_foreign_key("location", Some(dc1.object_ref()));
        store.save(&sw1).unwrap();

        let rows = store
            .execute(&Query::all(device_type()).prefetch_related(["location", "tags"]))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].related["location"].id, dc1.id);
        assert!(rows[0].related_sets["tags"].is_empty());

        let err = store
            .execute(&Query::all(device_type()).prefetch_related(["name"]))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperation { .. }));
    }

    #[test]
    fn association_cardinality() {
        let store = store();
        store
            .register_relationship(Relationship::new(
                "device_location",
                device_type(),
                location_type(),
                RelationshipKind::OneToOne,
            ))
            .unwrap();
        let sw1 = insert(&store, device_type(), "sw1");
        let sw2 = insert(&store, device_type(), "sw2");
        let dc1 = insert(&store, location_type(), "dc1");

        let (_, created) = store.get_or_create_association("device_location", sw1.id, dc1.id).unwrap();
        assert!(created);
        let (_, created) = store.get_or_create_association("device_location", sw1.id, dc1.id).unwrap();
        assert!(!created);

        let err = store
            .get_or_create_association("device_location", sw2.id, dc1.id)
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
    }

    #[test]
    fn update_or_create_moves_far_end() {
        let store = store();
        store
            .register_relationship(Relationship::new(
                "device_location",
                device_type(),
                location_type(),
                RelationshipKind::OneToMany,
            ))
            .unwrap();
        let sw1 = insert(&store, device_type(), "sw1");
        let dc1 = insert(&store, location_type(), "dc1");
        let dc2 = insert(&store, location_type(), "dc2");

        let (first, created) = store
            .update_or_create_association("device_location", RelationshipSide::Destination, dc1.id, sw1.id)
            .unwrap();
        assert!(created);
        let (moved, created) = store
            .update_or_create_association("device_location", RelationshipSide::Source, sw1.id, dc2.id)
            .unwrap();
        assert!(!created);
        assert_eq!(moved.id, first.id);
        assert_eq!(moved.destination_id, dc2.id);
        assert_eq!(store.stats().association_writes, 2);

        let (same, created) = store
            .update_or_create_association("device_location", RelationshipSide::Source, sw1.id, dc2.id)
            .unwrap();
        assert!(!created);
        assert_eq!(same, moved);
        assert_eq!(store.stats().association_writes, 2);
    }

    #[test]
    fn delete_removes_associations() {
        let store = store();
        store
            .register_relationship(Relationship::new(
                "device_location",
                device_type(),
                location_type(),
                RelationshipKind::ManyToMany,
            ))
            .unwrap();
        let sw1 = insert(&store, device_type(), "sw1");
        let dc1 = insert(&store, location_type(), "dc1");
        store.get_or_create_association("device_location", sw1.id, dc1.id).unwrap();

        store.delete(&device_type(), sw1.id).unwrap();
        assert!(store.associations(&AssociationFilter::default()).is_empty());
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = store();
        let result: StoreResult<()> = store.transaction(|s| {
            insert(s, device_type(), "sw1");
            Err(StoreError::invalid_operation("abort"))
        });
        assert!(result.is_err());
        assert_eq!(store.count(&device_type()).unwrap(), 0);
        assert!(!store.in_transaction());

        store
            .transaction(|s| -> StoreResult<()> {
                insert(s, device_type(), "sw2");
                Ok(())
            })
            .unwrap();
        assert_eq!(store.count(&device_type()).unwrap(), 1);
        assert_eq!(store.stats().commits, 1);
        assert_eq!(store.stats().rollbacks, 1);
    }

    #[test]
    fn commit_without_transaction_fails() {
        let store = Store::open_in_memory();
        assert!(store.commit().is_err());
        assert!(store.rollback().is_err());
    }

    #[test]
    fn stats_report_table_sizes() {
        let store = store();
        let device = insert(&store, device_type(), "sw1");
        let tag = insert(&store, tag_type(), "core");
        store.set_related(&device_type(), "tags", device.id, &[tag.id]).unwrap();

        let stats = store.stats();
        assert_eq!(stats.rows[&device_type()], 1);
        assert_eq!(stats.links, 1);
        assert_eq!(stats.saves, 2);
        assert_eq!(stats.relation_sets, 1);
    }
}
