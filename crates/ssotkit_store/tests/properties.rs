//! Property tests for relational set semantics.

use proptest::prelude::*;
use ssotkit_store::{Entity, Lookup, SchemaDef, Store, TypeKey};
use std::collections::BTreeSet;

fn device_type() -> TypeKey {
    TypeKey::new("dcim", "device")
}

fn tag_type() -> TypeKey {
    TypeKey::new("extras", "tag")
}

fn store_with_tags(count: usize) -> (Store, Entity, Vec<Entity>) {
    let store = Store::open_in_memory();
    store
        .register_schema(SchemaDef::new(tag_type()).unique_column("name"))
        .unwrap();
    store
        .register_schema(
            SchemaDef::new(device_type())
                .unique_column("name")
                .many_to_many("tags", tag_type()),
        )
        .unwrap();

    let mut device = Entity::new(device_type());
    device.set("name", "sw1");
    store.save(&device).unwrap();

    let tags = (0..count)
        .map(|i| {
            let mut tag = Entity::new(tag_type());
            tag.set("name", format!("tag{i}"));
            store.save(&tag).unwrap();
            tag
        })
        .collect();
    (store, device, tags)
}

proptest! {
    #[test]
    fn set_related_ends_with_exactly_the_targets(
        first in prop::collection::btree_set(0usize..8, 0..8),
        second in prop::collection::btree_set(0usize..8, 0..8),
    ) {
        let (store, device, tags) = store_with_tags(8);
        let ids = |picks: &BTreeSet<usize>| picks.iter().map(|i| tags[*i].id).collect::<Vec<_>>();

        store.set_related(&device_type(), "tags", device.id, &ids(&first)).unwrap();
        let change = store.set_related(&device_type(), "tags", device.id, &ids(&second)).unwrap();

        let current: BTreeSet<_> = store
            .related_ids(&device_type(), "tags", device.id)
            .unwrap()
            .into_iter()
            .collect();
        let expected: BTreeSet<_> = ids(&second).into_iter().collect();
        prop_assert_eq!(&current, &expected);

        prop_assert_eq!(change.added.len(), second.difference(&first).count());
        prop_assert_eq!(change.removed.len(), first.difference(&second).count());
    }

    #[test]
    fn unique_lookup_matches_exactly_one_saved_name(n in 1usize..6, pick in 0usize..6) {
        let (store, _, tags) = store_with_tags(n);
        let pick = pick % n;
        let found = store
            .get(&tag_type(), &Lookup::new().with("name", format!("tag{pick}")))
            .unwrap();
        prop_assert_eq!(found.id, tags[pick].id);
    }
}

#[test]
fn snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ssot.json");

    {
        let store = Store::open(&path).unwrap();
        store
            .register_schema(SchemaDef::new(tag_type()).unique_column("name"))
            .unwrap();
        let mut tag = Entity::new(tag_type());
        tag.set("name", "core");
        store.save(&tag).unwrap();
        store.save_snapshot().unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert_eq!(store.count(&tag_type()).unwrap(), 1);
    assert!(store.get(&tag_type(), &Lookup::new().with("name", "core")).is_ok());
}
