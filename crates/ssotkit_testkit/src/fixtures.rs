//! Test fixtures and store helpers.
//!
//! Re-exports the network schema and models, and adds the session,
//! parameter and snapshot helpers tests build on.

pub use ssotkit_network::*;

use ssotkit_store::Value;
use ssotkit_sync::{Params, SyncConfig, SyncSession};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Opens a seeded network store and a session with every model registered.
///
/// # Panics
///
/// If the fixture schema does not bind, which is a bug in the fixtures.
pub fn network_session(config: SyncConfig) -> SyncSession {
    let store = network_store().expect("failed to build network store");
    let session = SyncSession::with_config(Arc::new(store), config);
    register_network_models(&session).expect("failed to register network models");
    session
}

// ============================================================================
// Parameters
// ============================================================================

/// Builds a parameter mapping from field/value pairs.
pub fn params<K, V, I>(pairs: I) -> Params
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Builds a to-many value of `{"name": ..}` lookups.
pub fn names<S: AsRef<str>>(names: &[S]) -> Value {
    Value::List(
        names
            .iter()
            .map(|name| Value::map([("name", Value::text(name.as_ref()))]))
            .collect(),
    )
}

/// A store snapshot in a temporary directory.
pub struct TempSnapshot {
    /// Path of the snapshot file.
    pub path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TempSnapshot {
    /// Creates a path for a snapshot file that does not exist yet.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self {
            path: temp_dir.path().join("store.json"),
            _temp_dir: temp_dir,
        }
    }
}

impl Default for TempSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_session_registers_every_model() {
        let session = network_session(SyncConfig::default());
        assert_eq!(session.models().len(), 5);
    }

    #[test]
    fn names_builds_lookup_list() {
        let value = names(&["core", "edge"]);
        assert_eq!(value.as_list().map(<[Value]>::len), Some(2));
    }
}
