//! Error types for the backing store.

use crate::entity::ObjectId;
use crate::types::TypeKey;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in backing store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error while reading or writing a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The type is not registered in the type registry.
    #[error("unknown type: {type_key}")]
    UnknownType {
        /// The type that was requested.
        type_key: String,
    },

    /// The field does not exist on the schema type.
    #[error("unknown field `{field}` on {type_key}")]
    UnknownField {
        /// The schema type.
        type_key: TypeKey,
        /// The unknown field name.
        field: String,
    },

    /// A unique lookup matched no rows.
    #[error("{type_key} matching {lookup} does not exist")]
    NotFound {
        /// The schema type searched.
        type_key: TypeKey,
        /// The rendered lookup parameters.
        lookup: String,
    },

    /// A unique lookup matched more than one row.
    #[error("{count} {type_key} rows match {lookup}, expected exactly one")]
    MultipleFound {
        /// The schema type searched.
        type_key: TypeKey,
        /// The rendered lookup parameters.
        lookup: String,
        /// How many rows matched.
        count: usize,
    },

    /// No entity exists with the given primary key.
    #[error("{type_key} with id {id} does not exist")]
    ObjectNotFound {
        /// The schema type searched.
        type_key: TypeKey,
        /// The missing primary key.
        id: ObjectId,
    },

    /// The entity's field values were rejected on save.
    #[error("validation failed for {type_key}: {message}")]
    Validation {
        /// The schema type being saved.
        type_key: TypeKey,
        /// Description of the rejected values.
        message: String,
    },

    /// The entity is still referenced by a non-nullable foreign key.
    #[error("cannot delete {type_key} {id}: referenced by {referenced_by}")]
    Protected {
        /// The schema type being deleted.
        type_key: TypeKey,
        /// The entity being deleted.
        id: ObjectId,
        /// The referencing type and field, as `type.field`.
        referenced_by: String,
    },

    /// No relationship is registered under the label.
    #[error("relationship not found: {label}")]
    RelationshipNotFound {
        /// The requested relationship label.
        label: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// Invalid snapshot format or version.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },
}

impl StoreError {
    /// Creates a validation error.
    pub fn validation(type_key: &TypeKey, message: impl Into<String>) -> Self {
        Self::Validation {
            type_key: type_key.clone(),
            message: message.into(),
        }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(type_key: &TypeKey, field: impl Into<String>) -> Self {
        Self::UnknownField {
            type_key: type_key.clone(),
            field: field.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns true if a unique lookup matched no rows.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::ObjectNotFound { .. })
    }

    /// Returns true if a unique lookup matched more than one row.
    pub fn is_multiple_found(&self) -> bool {
        matches!(self, Self::MultipleFound { .. })
    }
}
