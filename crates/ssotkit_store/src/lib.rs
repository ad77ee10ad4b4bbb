//! # ssotkit store
//!
//! In-memory relational backing store for ssotkit.
//!
//! This crate provides:
//! - A type registry of schema definitions keyed by `(namespace, name)`
//! - Entity rows with native columns, foreign keys and custom fields
//! - Unique lookups over `__`-separated relation paths
//! - Many-to-many links and reverse foreign key sets
//! - Named relationships and relationship associations
//! - Savepoint transactions and JSON snapshots

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod entity;
mod error;
mod lookup;
mod query;
mod relationship;
mod schema;
mod snapshot;
mod stats;
mod tables;
mod types;
mod value;

pub use config::StoreConfig;
pub use database::Store;
pub use entity::{Entity, ObjectId};
pub use error::{StoreError, StoreResult};
pub use lookup::{split_path, Lookup, PATH_SEPARATOR};
pub use query::{Query, Row};
pub use relationship::{
    AssociationFilter, Relationship, RelationshipAssociation, RelationshipKind, RelationshipSide,
};
pub use schema::{Cardinality, FieldDef, FieldKind, SchemaDef};
pub use stats::{StatsSnapshot, StoreStats};
pub use tables::RelationChange;
pub use types::{ObjectRef, ParseTypeKeyError, TypeKey};
pub use value::Value;
