//! Synchronization session.
//!
//! A session holds what one synchronization pass shares: the store handle,
//! the configuration, the bound model types, the relationship cache and the
//! in-memory instance bookkeeping the diff engine works against.

use crate::cache::RelationshipCache;
use crate::config::SyncConfig;
use crate::descriptor::{ModelDescriptor, ModelType};
use crate::error::{SyncError, SyncResult};
use crate::instance::{ModelInstance, Params};
use crate::persist::WriteContext;
use crate::query;
use crate::state::WriteReport;
use parking_lot::RwLock;
use ssotkit_store::Store;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One synchronization pass over a store.
pub struct SyncSession {
    store: Arc<Store>,
    config: SyncConfig,
    relationships: RelationshipCache,
    /// Bound model types in registration order.
    models: RwLock<Vec<Arc<ModelType>>>,
    /// Instances by model name, then unique id.
    instances: RwLock<BTreeMap<String, BTreeMap<String, ModelInstance>>>,
    last_report: RwLock<Option<WriteReport>>,
}

impl SyncSession {
    /// Creates a session with the default configuration.
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_config(store, SyncConfig::default())
    }

    /// Creates a session with a custom configuration.
    pub fn with_config(store: Arc<Store>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            relationships: RelationshipCache::new(),
            models: RwLock::new(Vec::new()),
            instances: RwLock::new(BTreeMap::new()),
            last_report: RwLock::new(None),
        }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the per-pass relationship cache.
    pub fn relationships(&self) -> &RelationshipCache {
        &self.relationships
    }

    /// Binds and registers a model declaration.
    ///
    /// # Errors
    ///
    /// `Configuration` if the declaration does not fit the store schema or
    /// a model with the same name is already registered.
    pub fn register(&self, descriptor: ModelDescriptor) -> SyncResult<Arc<ModelType>> {
        let model = Arc::new(ModelType::bind(descriptor, &self.store)?);
        let mut models = self.models.write();
        if models.iter().any(|m| m.name() == model.name()) {
            return Err(SyncError::configuration(
                model.name(),
                "a model with this name is already registered",
            ));
        }
        models.push(Arc::clone(&model));
        debug!(model = model.name(), schema_type = %model.schema_type(), "registered model");
        Ok(model)
    }

    /// Returns a registered model type.
    pub fn model(&self, name: &str) -> SyncResult<Arc<ModelType>> {
        self.models
            .read()
            .iter()
            .find(|m| m.name() == name)
            .cloned()
            .ok_or_else(|| SyncError::configuration(name, "model is not registered"))
    }

    /// Returns every registered model type, in registration order.
    pub fn models(&self) -> Vec<Arc<ModelType>> {
        self.models.read().clone()
    }

    /// Returns the store handle and pass-wide state for direct writes.
    pub fn write_context(&self) -> WriteContext<'_> {
        WriteContext {
            store: &self.store,
            config: &self.config,
            relationships: &self.relationships,
        }
    }

    /// Returns the outcome of the most recent write.
    pub fn last_report(&self) -> Option<WriteReport> {
        self.last_report.read().clone()
    }

    // ========================================================================
    // Bookkeeping
    // ========================================================================

    /// Looks up a tracked instance by its identifiers.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` if no instance with these identifiers is tracked.
    pub fn get(&self, model: &str, identifiers: &Params) -> SyncResult<ModelInstance> {
        let unique_id = self.model(model)?.unique_id(identifiers);
        self.instances
            .read()
            .get(model)
            .and_then(|by_id| by_id.get(&unique_id))
            .cloned()
            .ok_or(SyncError::ObjectNotFound {
                model: model.to_string(),
                unique_id,
            })
    }

    /// Starts tracking an instance.
    ///
    /// # Errors
    ///
    /// `ObjectAlreadyExists` if an instance with the same unique id is
    /// already tracked.
    pub fn add(&self, instance: ModelInstance) -> SyncResult<()> {
        let mut instances = self.instances.write();
        let by_id = instances.entry(instance.model().to_string()).or_default();
        if by_id.contains_key(instance.unique_id()) {
            return Err(SyncError::ObjectAlreadyExists {
                model: instance.model().to_string(),
                unique_id: instance.unique_id().to_string(),
            });
        }
        by_id.insert(instance.unique_id().to_string(), instance);
        Ok(())
    }

    /// Stops tracking an instance.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` if the instance is not tracked.
    pub fn remove(&self, instance: &ModelInstance) -> SyncResult<ModelInstance> {
        self.instances
            .write()
            .get_mut(instance.model())
            .and_then(|by_id| by_id.remove(instance.unique_id()))
            .ok_or_else(|| SyncError::ObjectNotFound {
                model: instance.model().to_string(),
                unique_id: instance.unique_id().to_string(),
            })
    }

    /// Returns the tracked instances of a model, ordered by unique id.
    pub fn instances(&self, model: &str) -> Vec<ModelInstance> {
        self.instances
            .read()
            .get(model)
            .map(|by_id| by_id.values().cloned().collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Creates the backing entity of a new instance and tracks it.
    ///
    /// # Errors
    ///
    /// Any write error; the instance is not tracked unless the write
    /// succeeded.
    pub fn create(&self, model: &str, identifiers: Params, attributes: Params) -> SyncResult<ModelInstance> {
        let model = self.model(model)?;
        let instance = ModelInstance::new(&model, identifiers, attributes)?;
        let report = self.record(self.write_context().create(
            &model,
            instance.identifiers(),
            &instance.attributes,
        ))?;
        debug!(
            model = model.name(),
            unique_id = instance.unique_id(),
            object_id = %report.object_id,
            "created"
        );
        self.track(instance.clone());
        Ok(instance)
    }

    /// Writes changed attributes of a tracked or stored instance.
    ///
    /// Only `attributes` are written; identifiers never change.
    pub fn update(&self, model: &str, identifiers: &Params, attributes: Params) -> SyncResult<ModelInstance> {
        let model_type = self.model(model)?;
        let mut instance = match self.get(model, identifiers) {
            Ok(tracked) => tracked,
            Err(SyncError::ObjectNotFound { .. }) => {
                ModelInstance::new(&model_type, identifiers.clone(), Params::new())?
            }
            Err(e) => return Err(e),
        };
        let changed = ModelInstance::new(&model_type, identifiers.clone(), attributes)?.attributes;
        self.record(
            self.write_context()
                .update(&model_type, instance.identifiers(), &changed),
        )?;
        instance.apply_attributes(changed);
        self.track(instance.clone());
        Ok(instance)
    }

    /// Deletes, or safe-deletes, the backing entity and stops tracking it.
    pub fn delete(&self, model: &str, identifiers: &Params) -> SyncResult<ModelInstance> {
        let model_type = self.model(model)?;
        let instance = match self.get(model, identifiers) {
            Ok(tracked) => tracked,
            Err(SyncError::ObjectNotFound { .. }) => {
                ModelInstance::new(&model_type, identifiers.clone(), Params::new())?
            }
            Err(e) => return Err(e),
        };
        self.record(self.write_context().delete(&model_type, instance.identifiers()))?;
        // Untracked instances were never in the bookkeeping.
        let _ = self.remove(&instance);
        Ok(instance)
    }

    fn record(&self, result: SyncResult<WriteReport>) -> SyncResult<WriteReport> {
        let report = result?;
        *self.last_report.write() = Some(report.clone());
        Ok(report)
    }

    fn track(&self, instance: ModelInstance) {
        self.instances
            .write()
            .entry(instance.model().to_string())
            .or_default()
            .insert(instance.unique_id().to_string(), instance);
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Loads and tracks every stored instance of a model.
    ///
    /// Instances already tracked are replaced by their stored state.
    pub fn load(&self, model: &str) -> SyncResult<Vec<ModelInstance>> {
        let model = self.model(model)?;
        let loaded = query::load(&model, &self.store, &self.config, &self.relationships)?;
        for instance in &loaded {
            self.track(instance.clone());
        }
        info!(model = model.name(), count = loaded.len(), "loaded model");
        Ok(loaded)
    }

    /// Loads every registered model, in registration order.
    pub fn load_all(&self) -> SyncResult<BTreeMap<String, Vec<ModelInstance>>> {
        let mut loaded = BTreeMap::new();
        for model in self.models() {
            let instances = self.load(model.name())?;
            loaded.insert(model.name().to_string(), instances);
        }
        Ok(loaded)
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("config", &self.config)
            .field("models", &self.models.read().len())
            .field("relationships", &self.relationships.len())
            .finish_non_exhaustive()
    }
}
