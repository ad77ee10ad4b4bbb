//! # ssotkit Sync Engine
//!
//! Maps normalized model instances onto a relational backing store.
//!
//! This crate provides:
//! - Annotations for custom scalar fields and custom relationships
//! - Model descriptors bound once into a field classification table
//! - Field resolver and relationship materializer
//! - Object persistence with declarative to-many replacement
//! - Read-path query builder
//! - A synchronization session with instance bookkeeping
//!
//! ## Write path
//!
//! Each create or update runs one object write:
//! 1. Stage every field by class; foreign keys are only collected
//! 2. Resolve foreign keys by unique lookup (all-empty groups become null)
//! 3. Save the entity with full validation
//! 4. Write relationship associations and to-many sets
//!
//! ## Key Invariants
//!
//! - Every foreign key and to-many element resolves to exactly one row
//! - To-many writes replace the related set, they never add to it
//! - Custom scalars only ever land in the custom-field store
//! - Writing the same parameters twice leaves the store unchanged

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod annotation;
mod cache;
mod config;
mod descriptor;
mod error;
mod instance;
mod materializer;
mod persist;
mod query;
mod resolver;
mod session;
mod staging;
mod state;
mod typed;

pub use annotation::{CustomFieldAnnotation, CustomRelationshipAnnotation};
pub use cache::RelationshipCache;
pub use config::{DeletePolicy, SyncConfig, SYSTEM_OF_RECORD_FIELD};
pub use descriptor::{
    FieldClass, ModelDescriptor, ModelDescriptorBuilder, ModelType, QueryOverride, RelatedType,
    DEFAULT_LOOKUP_KEYS,
};
pub use error::{SyncError, SyncResult};
pub use instance::{ModelFlags, ModelInstance, Params};
pub use materializer::AssociationCounts;
pub use persist::WriteContext;
pub use query::{build_query, default_query, load, read_path};
pub use resolver::classify_and_stage;
pub use session::SyncSession;
pub use staging::{
    ForeignKeyTarget, StagedCustomForeignKey, StagedCustomToMany, StagedForeignKey, StagedWrite,
};
pub use state::{WriteOperation, WriteReport, WriteState};
pub use typed::TypedModel;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
