//! Error types for the sync engine.

use ssotkit_store::{Lookup, StoreError};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while reading or writing normalized models.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The model declaration does not fit the backing schema.
    #[error("configuration error on model `{model}`: {message}")]
    Configuration {
        /// Model name.
        model: String,
        /// What is wrong with the declaration.
        message: String,
    },

    /// A unique lookup for a related object matched no rows.
    #[error("couldn't find {field} instance with: {lookup}")]
    Lookup {
        /// The field being resolved.
        field: String,
        /// The attempted lookup parameters.
        lookup: Lookup,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// A unique lookup for a related object matched more than one row.
    #[error("found {count} instances for {field} with: {lookup}")]
    Ambiguity {
        /// The field being resolved.
        field: String,
        /// The attempted lookup parameters.
        lookup: Lookup,
        /// How many rows matched.
        count: usize,
    },

    /// The store rejected the object's values on save.
    #[error("validation failed for {model}; parameters: {parameters}")]
    Validation {
        /// Model name.
        model: String,
        /// The full attempted parameter mapping.
        parameters: Lookup,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// The object expected to exist for an update or delete does not.
    #[error("{model} with identifiers {identifiers} does not exist in the store")]
    NotFound {
        /// Model name.
        model: String,
        /// The identifier values used for the lookup.
        identifiers: Lookup,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// Store error passed through unchanged.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Typed model conversion failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The session already tracks an instance with the same identifiers.
    #[error("{model} `{unique_id}` already exists in the session")]
    ObjectAlreadyExists {
        /// Model name.
        model: String,
        /// Joined identifier values.
        unique_id: String,
    },

    /// The session does not track an instance with these identifiers.
    #[error("{model} `{unique_id}` is not tracked by the session")]
    ObjectNotFound {
        /// Model name.
        model: String,
        /// Joined identifier values.
        unique_id: String,
    },
}

impl SyncError {
    /// Creates a configuration error.
    pub fn configuration(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Maps a failed unique lookup for `field` to `Lookup` or `Ambiguity`.
    ///
    /// Other store errors pass through as `Store`.
    pub fn from_lookup(field: impl Into<String>, lookup: Lookup, error: StoreError) -> Self {
        match error {
            StoreError::NotFound { .. } | StoreError::ObjectNotFound { .. } => Self::Lookup {
                field: field.into(),
                lookup,
                source: error,
            },
            StoreError::MultipleFound { count, .. } => Self::Ambiguity {
                field: field.into(),
                lookup,
                count,
            },
            other => Self::Store(other),
        }
    }

    /// Returns true for problems with the data being synchronized, as
    /// opposed to bugs in a model declaration.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            SyncError::Lookup { .. }
                | SyncError::Ambiguity { .. }
                | SyncError::Validation { .. }
                | SyncError::NotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssotkit_store::TypeKey;

    fn not_found() -> StoreError {
        StoreError::NotFound {
            type_key: TypeKey::new("dcim", "location"),
            lookup: r#"{"name": "dc9"}"#.into(),
        }
    }

    #[test]
    fn lookup_error_names_field_and_parameters() {
        let err = SyncError::from_lookup("location", Lookup::new().with("name", "dc9"), not_found());
        assert!(matches!(err, SyncError::Lookup { .. }));
        assert_eq!(
            err.to_string(),
            r#"couldn't find location instance with: {"name": "dc9"}"#
        );
        assert!(err.is_data_error());
    }

    #[test]
    fn multiple_found_becomes_ambiguity() {
        let store_err = StoreError::MultipleFound {
            type_key: TypeKey::new("dcim", "location"),
            lookup: String::new(),
            count: 2,
        };
        let err = SyncError::from_lookup("location", Lookup::new().with("name", "dc1"), store_err);
        assert!(matches!(err, SyncError::Ambiguity { count: 2, .. }));
        assert!(err.to_string().contains("location"));
        assert!(err.to_string().contains("dc1"));
    }

    #[test]
    fn other_store_errors_pass_through() {
        let err = SyncError::from_lookup(
            "location",
            Lookup::new(),
            StoreError::invalid_operation("nope"),
        );
        assert!(matches!(err, SyncError::Store(_)));
    }

    #[test]
    fn configuration_is_not_a_data_error() {
        let err = SyncError::configuration("device", "field `foo` is not defined on the model");
        assert!(!err.is_data_error());
        assert!(err.to_string().contains("device"));
    }
}
