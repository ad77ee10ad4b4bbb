//! # ssotkit network
//!
//! A small network source-of-truth schema and the sync models over it.
//!
//! This crate provides:
//! - Schema types for statuses, tags, locations, devices, interfaces,
//!   tenants and notes
//! - The `tenant_devices` and `location_tenants` custom relationships
//! - Seed rows for an empty store
//! - Model declarations for every synchronized type

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod models;
mod schema;

pub use models::{
    device_model, interface_model, location_model, note_model, register_network_models, tag_model,
};
pub use schema::{
    device_type, install_network_schema, interface_type, location_type, location_type_type,
    network_relationships, network_schemas, network_store, note_type, save_named, seed,
    status_type, tag_type, tenant_group_type, tenant_type, LOCATION_TENANTS, SEED_STATUSES,
    SEED_TAGS, TENANT_DEVICES,
};
