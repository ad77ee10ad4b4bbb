//! Init command implementation.

use ssotkit_network::{install_network_schema, seed};
use ssotkit_store::{Store, StoreConfig};
use std::path::Path;
use tracing::info;

/// Runs the init command.
///
/// Fails if a snapshot already exists at `path`.
pub fn run(path: &Path, with_seed: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open_with_config(path, StoreConfig::new().error_if_exists(true))?;
    install_network_schema(&store)?;
    if with_seed {
        seed(&store)?;
    }
    store.save_snapshot()?;

    let stats = store.stats();
    info!(
        path = %path.display(),
        types = stats.rows.len(),
        rows = stats.rows.values().sum::<usize>(),
        "initialized store"
    );
    println!("Initialized store at {}", path.display());
    Ok(())
}
