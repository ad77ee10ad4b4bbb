//! CLI command implementations.

pub mod apply;
pub mod init;
pub mod inspect;
pub mod load;

use clap::ValueEnum;
use ssotkit_store::{Store, StoreConfig};
use ssotkit_sync::{SyncConfig, SyncSession};
use std::path::Path;
use std::sync::Arc;

/// Output format of the reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Opens an existing store snapshot.
pub fn open_store(path: &Path) -> Result<Store, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    Ok(Store::open_with_config(
        path,
        StoreConfig::new().create_if_missing(false),
    )?)
}

/// Opens an existing store and registers the network models on a session.
pub fn open_session(
    path: &Path,
    config: SyncConfig,
) -> Result<SyncSession, Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let session = SyncSession::with_config(Arc::new(store), config);
    ssotkit_network::register_network_models(&session)?;
    Ok(session)
}
