//! Typed models.
//!
//! Lets a plain struct stand in for a [`ModelInstance`]. The struct's serde
//! representation must be a map whose keys are the model's field names,
//! dotted ones included (use `#[serde(rename = "location__name")]`).

use crate::descriptor::ModelType;
use crate::error::SyncResult;
use crate::instance::{ModelInstance, Params};
use crate::session::SyncSession;
use serde::de::DeserializeOwned;
use serde::Serialize;
use ssotkit_store::Value;

/// A struct mapped onto a registered model.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct Device {
///     name: String,
///     #[serde(rename = "location__name")]
///     location: Option<String>,
/// }
///
/// impl TypedModel for Device {
///     const MODEL: &'static str = "device";
/// }
///
/// let created = Device::create(&session, &device)?;
/// let all: Vec<Device> = Device::load(&session)?;
/// ```
pub trait TypedModel: Serialize + DeserializeOwned {
    /// Name of the registered model.
    const MODEL: &'static str;

    /// Splits `self` into identifier and attribute parameters.
    ///
    /// # Errors
    ///
    /// `Codec` if the struct does not serialize to a map of supported
    /// values, `Configuration` if a key is not a field of the model.
    fn to_instance(&self, model: &ModelType) -> SyncResult<ModelInstance> {
        let params: Params = serde_json::from_value(serde_json::to_value(self)?)?;
        let (identifiers, attributes) = params
            .into_iter()
            .partition(|(field, _)| model.is_identifier(field));
        ModelInstance::new(model, identifiers, attributes)
    }

    /// Rebuilds the struct from an instance's fields.
    fn from_instance(instance: &ModelInstance) -> SyncResult<Self> {
        let params = Value::Map(instance.params());
        Ok(serde_json::from_value(serde_json::to_value(params)?)?)
    }

    /// Creates the backing entity through `session`.
    fn create(session: &SyncSession, value: &Self) -> SyncResult<Self> {
        let model = session.model(Self::MODEL)?;
        let instance = value.to_instance(&model)?;
        let identifiers = instance.identifiers().clone();
        let created = session.create(Self::MODEL, identifiers, instance.attributes)?;
        Self::from_instance(&created)
    }

    /// Loads every stored instance through `session`.
    fn load(session: &SyncSession) -> SyncResult<Vec<Self>> {
        session
            .load(Self::MODEL)?
            .iter()
            .map(Self::from_instance)
            .collect()
    }
}
