//! Sync model declarations over the network schema.

use crate::schema::{
    device_type, interface_type, location_type, note_type, tag_type, LOCATION_TENANTS,
    TENANT_DEVICES,
};
use ssotkit_store::RelationshipSide;
use ssotkit_sync::{ModelDescriptor, SyncResult, SyncSession};

/// Location model: custom scalar stamp and a custom to-many of tenants.
pub fn location_model() -> ModelDescriptor {
    ModelDescriptor::builder("location", location_type())
        .identifier("name")
        .attribute("location_type__name")
        .attribute("parent__name")
        .attribute("status__name")
        .attribute("description")
        .attribute("tenants")
        .custom_relationship("tenants", LOCATION_TENANTS, RelationshipSide::Source)
        .build()
}

/// Device model: native foreign keys, tags, a custom scalar and a custom
/// foreign key to its tenant.
pub fn device_model() -> ModelDescriptor {
    ModelDescriptor::builder("device", device_type())
        .identifier("name")
        .attribute("serial")
        .attribute("status__name")
        .attribute("location__name")
        .attribute("tags")
        .attribute("owner")
        .attribute("tenant__name")
        .custom_field("owner", "owner")
        .custom_relationship("tenant__name", TENANT_DEVICES, RelationshipSide::Destination)
        .build()
}

/// Interface model, identified by its device and its own name.
pub fn interface_model() -> ModelDescriptor {
    ModelDescriptor::builder("interface", interface_type())
        .identifier("device__name")
        .identifier("name")
        .attribute("description")
        .attribute("status__name")
        .build()
}

/// Note model with a generic foreign key.
pub fn note_model() -> ModelDescriptor {
    ModelDescriptor::builder("note", note_type())
        .identifier("text")
        .attribute("assigned_object__app_label")
        .attribute("assigned_object__model")
        .attribute("assigned_object__name")
        .build()
}

/// Tag model.
pub fn tag_model() -> ModelDescriptor {
    ModelDescriptor::builder("tag", tag_type())
        .identifier("name")
        .attribute("color")
        .build()
}

/// Registers every network model on `session`, dependencies first.
pub fn register_network_models(session: &SyncSession) -> SyncResult<()> {
    for descriptor in [
        tag_model(),
        location_model(),
        device_model(),
        interface_model(),
        note_model(),
    ] {
        session.register(descriptor)?;
    }
    Ok(())
}
