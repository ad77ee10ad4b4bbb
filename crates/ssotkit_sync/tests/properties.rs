//! Property tests for the write contract: declarative replacement of to-many
//! sets and idempotent rewrites.

use proptest::prelude::*;
use ssotkit_store::{RelationshipSide, Value};
use ssotkit_testkit::prelude::*;

fn tenant_set_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(vec!["acme", "globex"], 0..=2)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn native_to_many_ends_with_last_set(
        first in tag_set_strategy(),
        second in tag_set_strategy(),
    ) {
        let mut harness = SyncHarness::new();
        replacement::check_tag_replacement(&mut harness, "sw1", &first, &second);
    }

    #[test]
    fn custom_to_many_ends_with_last_set(
        sets in prop::collection::vec(tenant_set_strategy(), 1..4),
    ) {
        let mut harness = SyncHarness::new();
        let dc1 = harness.entity(&location_type(), "dc1");
        let ids = params([("name", "dc1")]);
        for set in &sets {
            harness
                .update("location", &ids, params([("tenants", names(set))]))
                .unwrap();
        }
        let expected: Vec<String> = sets
            .last()
            .map(|set| set.iter().map(|s| (*s).to_string()).collect())
            .unwrap_or_default();
        prop_assert_eq!(
            harness.associated_names(LOCATION_TENANTS, RelationshipSide::Source, dc1.id),
            expected
        );
    }

    #[test]
    fn rewriting_a_device_changes_nothing(device in device_write_strategy()) {
        let mut harness = SyncHarness::new();
        idempotence::check_rewrite_is_stable(&mut harness, &device);
    }

    #[test]
    fn custom_foreign_key_rewrite_adds_no_association(
        tenant in prop::sample::select(vec!["acme", "globex"]),
        rewrites in 1usize..4,
    ) {
        let mut harness = SyncHarness::new();
        let ids = params([("name", "sw1")]);
        let attributes = params([
            ("status__name", Value::text("Active")),
            ("tenant__name", Value::text(tenant)),
        ]);
        harness.create("device", ids.clone(), attributes.clone()).unwrap();
        for _ in 0..rewrites {
            harness.update("device", &ids, attributes.clone()).unwrap();
        }
        let device = harness.entity(&device_type(), "sw1");
        prop_assert_eq!(
            harness.associated_names(TENANT_DEVICES, RelationshipSide::Destination, device.id),
            vec![tenant.to_string()]
        );
    }

    #[test]
    fn written_devices_load_back(
        writes in prop::collection::vec(device_write_strategy(), 1..6),
    ) {
        let mut harness = SyncHarness::new();
        for device in &writes {
            harness.write_device(device).unwrap();
        }
        harness.verify_all();
    }
}
