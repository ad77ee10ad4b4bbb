//! Normalized model instances.

use crate::descriptor::ModelType;
use crate::error::{SyncError, SyncResult};
use serde::Serialize;
use ssotkit_store::Value;
use std::collections::BTreeMap;
use std::ops::BitOr;

/// Field values of a model instance, by field name.
pub type Params = BTreeMap<String, Value>;

/// Per-instance flags consulted by the diff engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ModelFlags(u8);

impl ModelFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Do not delete this object when the other side has no counterpart.
    pub const SKIP_UNMATCHED_DST: Self = Self(1);

    /// Returns true if every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the flags in `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Returns true if no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ModelFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// An in-memory, normalized instance of a model.
///
/// Identifier values are fixed at construction; attributes may be replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInstance {
    model: String,
    unique_id: String,
    identifiers: Params,
    /// Attribute values.
    pub attributes: Params,
    /// Diff engine flags.
    pub flags: ModelFlags,
}

impl ModelInstance {
    /// Creates an instance of `model`.
    ///
    /// # Errors
    ///
    /// `Configuration` if an identifier is missing or a field is not an
    /// identifier or attribute of the model respectively.
    pub fn new(model: &ModelType, identifiers: Params, attributes: Params) -> SyncResult<Self> {
        for field in model.identifiers() {
            if !identifiers.contains_key(field) {
                return Err(SyncError::configuration(
                    model.name(),
                    format!("missing identifier `{field}`"),
                ));
            }
        }
        for field in identifiers.keys() {
            if !model.is_identifier(field) {
                return Err(SyncError::configuration(
                    model.name(),
                    format!("`{field}` is not an identifier of the model"),
                ));
            }
        }
        for field in attributes.keys() {
            if !model.attributes().contains(field) {
                return Err(SyncError::configuration(
                    model.name(),
                    format!("field `{field}` is not defined on the model"),
                ));
            }
        }

        Ok(Self {
            model: model.name().to_string(),
            unique_id: model.unique_id(&identifiers),
            identifiers,
            attributes,
            flags: ModelFlags::NONE,
        })
    }

    /// Returns the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the identifier values joined into the session key.
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Returns the identifier values.
    pub fn identifiers(&self) -> &Params {
        &self.identifiers
    }

    /// Returns a field value, identifier or attribute.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.identifiers
            .get(field)
            .or_else(|| self.attributes.get(field))
    }

    /// Returns identifiers and attributes merged into one mapping.
    pub fn params(&self) -> Params {
        let mut params = self.identifiers.clone();
        params.extend(self.attributes.clone());
        params
    }

    /// Replaces the given attributes.
    pub fn apply_attributes(&mut self, attributes: Params) {
        self.attributes.extend(attributes);
    }
}
