//! Network store schema, relationships and seed rows.

use ssotkit_store::{Entity, Relationship, RelationshipKind, SchemaDef, Store, StoreResult, TypeKey};
use tracing::debug;

/// Relationship between a tenant and the devices it owns.
pub const TENANT_DEVICES: &str = "tenant_devices";
/// Relationship between a location and the tenants it serves.
pub const LOCATION_TENANTS: &str = "location_tenants";

/// Status rows created by [`seed`].
pub const SEED_STATUSES: &[&str] = &["Active", "Planned", "Decommissioned"];
/// Tag rows created by [`seed`].
pub const SEED_TAGS: &[&str] = &["core", "edge", "dmz", "lab", "mgmt"];

/// `extras.status`
pub fn status_type() -> TypeKey {
    TypeKey::new("extras", "status")
}

/// `extras.tag`
pub fn tag_type() -> TypeKey {
    TypeKey::new("extras", "tag")
}

/// `extras.note`
pub fn note_type() -> TypeKey {
    TypeKey::new("extras", "note")
}

/// `dcim.locationtype`
pub fn location_type_type() -> TypeKey {
    TypeKey::new("dcim", "locationtype")
}

/// `dcim.location`
pub fn location_type() -> TypeKey {
    TypeKey::new("dcim", "location")
}

/// `dcim.device`
pub fn device_type() -> TypeKey {
    TypeKey::new("dcim", "device")
}

/// `dcim.interface`
pub fn interface_type() -> TypeKey {
    TypeKey::new("dcim", "interface")
}

/// `tenancy.tenantgroup`
pub fn tenant_group_type() -> TypeKey {
    TypeKey::new("tenancy", "tenantgroup")
}

/// `tenancy.tenant`
pub fn tenant_type() -> TypeKey {
    TypeKey::new("tenancy", "tenant")
}

/// Returns the schema definitions of the network store, dependencies first.
pub fn network_schemas() -> Vec<SchemaDef> {
    vec![
        SchemaDef::new(status_type()).unique_column("name").column("color"),
        SchemaDef::new(tag_type()).unique_column("name").column("color"),
        SchemaDef::new(location_type_type()).unique_column("name"),
        SchemaDef::new(tenant_group_type()).unique_column("name"),
        SchemaDef::new(tenant_type())
            .unique_column("name")
            .nullable_foreign_key("tenant_group", tenant_group_type()),
        // Location names are unique per parent only.
        SchemaDef::new(location_type())
            .required_column("name")
            .column("description")
            .foreign_key("location_type", location_type_type())
            .nullable_foreign_key("parent", location_type())
            .nullable_foreign_key("status", status_type())
            .one_to_many("devices", device_type(), "location")
            .unique_together(&["name", "parent"])
            .custom_field("system_of_record"),
        SchemaDef::new(device_type())
            .unique_column("name")
            .column("serial")
            .foreign_key("status", status_type())
            .nullable_foreign_key("location", location_type())
            .many_to_many("tags", tag_type())
            .custom_field("owner")
            .custom_field("system_of_record"),
        SchemaDef::new(interface_type())
            .required_column("name")
            .column("description")
            .foreign_key("device", device_type())
            .nullable_foreign_key("status", status_type())
            .unique_together(&["device", "name"])
            .custom_field("system_of_record"),
        SchemaDef::new(note_type())
            .unique_column("text")
            .generic_foreign_key("assigned_object"),
    ]
}

/// Returns the custom relationships of the network store.
pub fn network_relationships() -> Vec<Relationship> {
    vec![
        Relationship::new(
            TENANT_DEVICES,
            tenant_type(),
            device_type(),
            RelationshipKind::OneToMany,
        ),
        Relationship::new(
            LOCATION_TENANTS,
            location_type(),
            tenant_type(),
            RelationshipKind::ManyToMany,
        ),
    ]
}

/// Registers the network schemas and relationships.
pub fn install_network_schema(store: &Store) -> StoreResult<()> {
    for schema in network_schemas() {
        store.register_schema(schema)?;
    }
    for relationship in network_relationships() {
        store.register_relationship(relationship)?;
    }
    Ok(())
}

/// Creates the seed rows: statuses, tags, one region with two sites, and a
/// tenant group with two tenants.
pub fn seed(store: &Store) -> StoreResult<()> {
    for name in SEED_STATUSES {
        save_named(store, status_type(), name)?;
    }
    for name in SEED_TAGS {
        save_named(store, tag_type(), name)?;
    }

    let region_type = save_named(store, location_type_type(), "Region")?;
    let site_type = save_named(store, location_type_type(), "Site")?;

    let mut region = Entity::new(location_type());
    region.set("name", "emea");
    region.set_foreign_key("location_type", Some(region_type.object_ref()));
    store.save(&region)?;
    for site in ["dc1", "dc2"] {
        let mut location = Entity::new(location_type());
        location.set("name", site);
        location.set_foreign_key("location_type", Some(site_type.object_ref()));
        location.set_foreign_key("parent", Some(region.object_ref()));
        store.save(&location)?;
    }

    let group = save_named(store, tenant_group_type(), "customers")?;
    for name in ["acme", "globex"] {
        let mut tenant = Entity::new(tenant_type());
        tenant.set("name", name);
        tenant.set_foreign_key("tenant_group", Some(group.object_ref()));
        store.save(&tenant)?;
    }
    debug!("seeded network store");
    Ok(())
}

/// Saves an entity with only a `name` column.
pub fn save_named(store: &Store, type_key: TypeKey, name: &str) -> StoreResult<Entity> {
    let mut entity = Entity::new(type_key);
    entity.set("name", name);
    store.save(&entity)?;
    Ok(entity)
}

/// Opens an in-memory store with the network schema and seed rows.
pub fn network_store() -> StoreResult<Store> {
    let store = Store::open_in_memory();
    install_network_schema(&store)?;
    seed(&store)?;
    Ok(store)
}
