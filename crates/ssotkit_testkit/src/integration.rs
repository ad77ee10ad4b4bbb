//! Cross-crate integration test helpers.
//!
//! Provides a harness that writes through a [`SyncSession`] and checks the
//! result against the backing store directly.

use crate::fixtures::{self, device_type, params};
use crate::generators::DeviceWrite;
use ssotkit_store::{
    AssociationFilter, Entity, Lookup, ObjectId, RelationshipSide, Store, TypeKey, Value,
};
use ssotkit_sync::{ModelInstance, Params, SyncConfig, SyncResult, SyncSession};
use std::collections::BTreeMap;

/// A test harness for sync/store integration testing.
pub struct SyncHarness {
    /// The session under test.
    pub session: SyncSession,
    /// Last parameters written per model and unique id.
    written: BTreeMap<(String, String), Params>,
}

impl SyncHarness {
    /// Creates a harness over a seeded network store.
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    /// Creates a harness with a custom session configuration.
    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            session: fixtures::network_session(config),
            written: BTreeMap::new(),
        }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Store {
        self.session.store()
    }

    /// Creates an instance and records its parameters.
    pub fn create(&mut self, model: &str, identifiers: Params, attributes: Params) -> SyncResult<ModelInstance> {
        let instance = self.session.create(model, identifiers, attributes)?;
        self.written.insert(
            (model.to_string(), instance.unique_id().to_string()),
            instance.params(),
        );
        Ok(instance)
    }

    /// Updates an instance and records the merged parameters.
    pub fn update(&mut self, model: &str, identifiers: &Params, attributes: Params) -> SyncResult<ModelInstance> {
        let instance = self.session.update(model, identifiers, attributes)?;
        self.written.insert(
            (model.to_string(), instance.unique_id().to_string()),
            instance.params(),
        );
        Ok(instance)
    }

    /// Deletes an instance and forgets its parameters.
    pub fn delete(&mut self, model: &str, identifiers: &Params) -> SyncResult<ModelInstance> {
        let instance = self.session.delete(model, identifiers)?;
        self.written
            .remove(&(model.to_string(), instance.unique_id().to_string()));
        Ok(instance)
    }

    /// Writes a generated device: created the first time, updated after.
    pub fn write_device(&mut self, device: &DeviceWrite) -> SyncResult<ModelInstance> {
        let identifiers = params([("name", device.name.as_str())]);
        let attributes = device_attributes(device);
        let key = ("device".to_string(), device.name.clone());
        if self.written.contains_key(&key) {
            self.update("device", &identifiers, attributes)
        } else {
            self.create("device", identifiers, attributes)
        }
    }

    /// Fetches an entity by name.
    ///
    /// # Panics
    ///
    /// If no single entity of `type_key` has this name.
    pub fn entity(&self, type_key: &TypeKey, name: &str) -> Entity {
        self.store()
            .get(type_key, &Lookup::new().with("name", name))
            .unwrap_or_else(|e| panic!("{type_key} `{name}`: {e}"))
    }

    /// Returns the sorted names of the rows related through a native
    /// to-many field.
    pub fn related_names(&self, type_key: &TypeKey, name: &str, field: &str) -> Vec<String> {
        let owner = self.entity(type_key, name);
        let related = self
            .store()
            .related(type_key, field, owner.id)
            .expect("Failed to read related set");
        sorted_names(&related)
    }

    /// Returns the sorted names of the far ends of the associations of
    /// relationship `label` anchored at `id` on `side`.
    pub fn associated_names(&self, label: &str, side: RelationshipSide, id: ObjectId) -> Vec<String> {
        let relationship = self.store().relationship(label).expect("Unknown relationship");
        let far_side = side.opposite();
        let far: Vec<Entity> = self
            .store()
            .associations(&AssociationFilter::relationship(label).with_endpoint(side, id))
            .into_iter()
            .map(|a| {
                self.store()
                    .get_by_id(relationship.type_of(far_side), a.endpoint(far_side))
                    .expect("Association points at a missing object")
            })
            .collect();
        sorted_names(&far)
    }

    /// Verifies that loading every written instance from the store yields
    /// the parameters last written.
    pub fn verify_all(&self) {
        for ((model, unique_id), expected) in &self.written {
            let loaded = self.session.load(model).expect("Failed to load model");
            let actual = loaded
                .iter()
                .find(|i| i.unique_id() == unique_id)
                .unwrap_or_else(|| panic!("{model} `{unique_id}` missing from the store"));
            for (field, value) in expected {
                assert_eq!(
                    normalize(actual.get(field)),
                    normalize(Some(value)),
                    "{model} `{unique_id}` field `{field}` mismatch"
                );
            }
        }
    }

    /// Returns the count of written instances.
    pub fn tracked_count(&self) -> usize {
        self.written.len()
    }
}

impl Default for SyncHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Attribute parameters for a generated device.
pub fn device_attributes(device: &DeviceWrite) -> Params {
    params([
        ("serial", device.serial.clone()),
        ("status__name", Value::text(device.status)),
        (
            "location__name",
            device.location.map(Value::text).unwrap_or_default(),
        ),
        ("tags", fixtures::names(&device.tags)),
        ("owner", device.owner.clone()),
    ])
}

fn sorted_names(entities: &[Entity]) -> Vec<String> {
    let mut names: Vec<String> = entities
        .iter()
        .filter_map(|e| e.get("name").and_then(Value::as_text).map(str::to_string))
        .collect();
    names.sort();
    names
}

/// Puts a written value in the shape the read path renders it in.
fn normalize(value: Option<&Value>) -> Value {
    match value {
        None => Value::Null,
        Some(Value::List(items)) => {
            let mut items = items.clone();
            items.sort();
            Value::List(items)
        }
        Some(other) => other.clone(),
    }
}

/// Checks of the declarative to-many contract.
pub mod replacement {
    use super::*;

    /// Writes `first` then `second` as the tags of `device` and checks that
    /// exactly `second` remains.
    pub fn check_tag_replacement(harness: &mut SyncHarness, device: &str, first: &[&str], second: &[&str]) {
        let identifiers = params([("name", device)]);
        let attributes = |tags: &[&str]| {
            params([
                ("status__name", Value::text("Active")),
                ("tags", fixtures::names(tags)),
            ])
        };

        if harness.session.get("device", &identifiers).is_ok() {
            harness
                .update("device", &identifiers, attributes(first))
                .expect("Failed to write first tag set");
        } else {
            harness
                .create("device", identifiers.clone(), attributes(first))
                .expect("Failed to write first tag set");
        }
        harness
            .update("device", &identifiers, attributes(second))
            .expect("Failed to write second tag set");

        let mut expected: Vec<String> = second.iter().map(|s| (*s).to_string()).collect();
        expected.sort();
        expected.dedup();
        assert_eq!(harness.related_names(&device_type(), device, "tags"), expected);
    }
}

/// Checks of write idempotence.
pub mod idempotence {
    use super::*;

    /// Writes `device` twice and checks that the second write changes
    /// neither the entity nor the association count.
    pub fn check_rewrite_is_stable(harness: &mut SyncHarness, device: &DeviceWrite) {
        harness.write_device(device).expect("Failed first write");
        let before = harness.entity(&device_type(), &device.name);
        let associations = harness.store().associations(&AssociationFilter::default()).len();

        harness.write_device(device).expect("Failed second write");
        let after = harness.entity(&device_type(), &device.name);
        assert_eq!(before, after, "rewrite changed {}", device.name);
        assert_eq!(
            harness.store().associations(&AssociationFilter::default()).len(),
            associations
        );
    }
}
