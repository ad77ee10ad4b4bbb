//! Configuration for the sync engine.

/// Name of the custom field stamped with the system of record.
pub const SYSTEM_OF_RECORD_FIELD: &str = "system_of_record";

/// What `delete` does to the backing entity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Remove the entity from the store.
    #[default]
    Hard,
    /// Keep the entity and mark it instead.
    ///
    /// A `status` foreign key is pointed at the status named `status`, and
    /// the tag named `tag` is added to a `tags` field. Fields the schema
    /// does not have are skipped.
    Safe {
        /// Name of the status to assign.
        status: String,
        /// Name of the tag to add.
        tag: String,
    },
}

impl DeletePolicy {
    /// Creates a safe delete policy.
    pub fn safe(status: impl Into<String>, tag: impl Into<String>) -> Self {
        Self::Safe {
            status: status.into(),
            tag: tag.into(),
        }
    }
}

/// Configuration for a synchronization session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Run each object write in a store transaction, rolled back on failure.
    pub atomic_writes: bool,
    /// Behavior of `delete`.
    pub delete_policy: DeletePolicy,
    /// Stamp written entities with this system of record.
    pub system_of_record: Option<String>,
    /// Include the full parameter mapping in debug logs.
    pub log_parameters: bool,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            atomic_writes: false,
            delete_policy: DeletePolicy::Hard,
            system_of_record: None,
            log_parameters: true,
        }
    }

    /// Sets whether object writes are atomic.
    pub fn with_atomic_writes(mut self, atomic: bool) -> Self {
        self.atomic_writes = atomic;
        self
    }

    /// Sets the delete policy.
    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Sets the system of record.
    pub fn with_system_of_record(mut self, name: impl Into<String>) -> Self {
        self.system_of_record = Some(name.into());
        self
    }

    /// Sets whether parameters are logged.
    pub fn with_log_parameters(mut self, log: bool) -> Self {
        self.log_parameters = log;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert!(!config.atomic_writes);
        assert_eq!(config.delete_policy, DeletePolicy::Hard);
        assert!(config.system_of_record.is_none());
        assert!(config.log_parameters);
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_atomic_writes(true)
            .with_delete_policy(DeletePolicy::safe("Decommissioned", "SSoT Safe Delete"))
            .with_system_of_record("librenms")
            .with_log_parameters(false);

        assert!(config.atomic_writes);
        assert_eq!(
            config.delete_policy,
            DeletePolicy::Safe {
                status: "Decommissioned".into(),
                tag: "SSoT Safe Delete".into(),
            }
        );
        assert_eq!(config.system_of_record.as_deref(), Some("librenms"));
        assert!(!config.log_parameters);
    }
}
