//! Property-based test generators using proptest.
//!
//! Strategies only produce values that fit the network fixtures: names
//! drawn from the seed rows, and identifiers that pass store validation.

use crate::fixtures::{SEED_STATUSES, SEED_TAGS};
use proptest::prelude::*;
use ssotkit_store::Value;

/// Strategy for device names such as `edge-sw12`.
pub fn device_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{2,8}-[a-z]{2,4}[0-9]{1,3}").expect("Invalid regex")
}

/// Strategy for optional serial numbers.
pub fn serial_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        prop::string::string_regex("[A-Z0-9]{6,12}")
            .expect("Invalid regex")
            .prop_map(Value::Text),
    ]
}

/// Strategy for a subset of the seeded tag names, in seed order.
pub fn tag_set_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(SEED_TAGS.to_vec(), 0..=SEED_TAGS.len())
}

/// Strategy for one of the seeded status names.
pub fn status_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(SEED_STATUSES.to_vec())
}

/// Strategy for a seeded site name, or none.
pub fn location_strategy() -> impl Strategy<Value = Option<&'static str>> {
    prop::option::of(prop::sample::select(vec!["dc1", "dc2"]))
}

/// Strategy for leaf values stored in custom fields.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        "[a-zA-Z0-9 _-]{0,24}".prop_map(Value::Text),
    ]
}

/// A device write with every attribute drawn from the fixtures.
#[derive(Debug, Clone)]
pub struct DeviceWrite {
    /// Device name.
    pub name: String,
    /// Serial number.
    pub serial: Value,
    /// Status name.
    pub status: &'static str,
    /// Site name.
    pub location: Option<&'static str>,
    /// Tag names.
    pub tags: Vec<&'static str>,
    /// Custom `owner` value.
    pub owner: Value,
}

/// Strategy for [`DeviceWrite`]s.
pub fn device_write_strategy() -> impl Strategy<Value = DeviceWrite> {
    (
        device_name_strategy(),
        serial_strategy(),
        status_strategy(),
        location_strategy(),
        tag_set_strategy(),
        scalar_value_strategy(),
    )
        .prop_map(|(name, serial, status, location, tags, owner)| DeviceWrite {
            name,
            serial,
            status,
            location,
            tags,
            owner,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn tag_sets_draw_from_seed() {
        let mut runner = TestRunner::default();
        for _ in 0..50 {
            let tags = tag_set_strategy().new_tree(&mut runner).unwrap().current();
            assert!(tags.iter().all(|t| SEED_TAGS.contains(t)));
        }
    }

    proptest! {
        #[test]
        fn device_names_are_not_empty(name in device_name_strategy()) {
            prop_assert!(name.contains('-'));
        }
    }
}
