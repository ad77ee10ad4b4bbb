//! Inspect command implementation.

use super::{open_store, OutputFormat};
use serde::Serialize;
use ssotkit_store::StatsSnapshot;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Snapshot path.
    pub path: String,
    /// Snapshot size in bytes.
    pub snapshot_size: u64,
    /// Registered schema types.
    pub types: Vec<String>,
    /// Table sizes and counters.
    pub stats: StatsSnapshot,
}

/// Collects inspection data for the store at `path`.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    Ok(InspectResult {
        path: path.display().to_string(),
        snapshot_size: std::fs::metadata(path)?.len(),
        types: store
            .schemas()
            .iter()
            .map(|schema| schema.type_key.to_string())
            .collect(),
        stats: store.stats(),
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Store: {}", result.path);
        println!("Snapshot size: {} bytes", result.snapshot_size);
        println!();
        println!("Types: {}", result.types.len());
        for (type_key, rows) in &result.stats.rows {
            println!("  {type_key}: {rows} row(s)");
        }
        println!();
        println!("Many-to-many links: {}", result.stats.links);
        println!("Relationships: {}", result.stats.relationships);
        println!("Associations: {}", result.stats.associations);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init;

    #[test]
    fn inspects_seeded_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        init::run(&path, true).unwrap();

        let result = inspect(&path).unwrap();
        assert!(result.snapshot_size > 0);
        assert!(result.types.contains(&"dcim.device".to_string()));
        assert_eq!(result.stats.relationships, 2);
        assert_eq!(result.stats.associations, 0);
        // Counters start from zero on every open.
        assert_eq!(result.stats.saves, 0);
    }

    #[test]
    fn missing_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(inspect(&dir.path().join("missing.json")).is_err());
    }
}
