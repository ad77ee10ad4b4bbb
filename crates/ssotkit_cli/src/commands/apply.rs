//! Apply command implementation.
//!
//! A change set is a JSON array of object writes, applied in order:
//!
//! ```json
//! [
//!   { "action": "create", "model": "device",
//!     "ids": { "name": "sw1" }, "attrs": { "status__name": "Active" } },
//!   { "action": "delete", "model": "device", "ids": { "name": "sw0" } }
//! ]
//! ```

use super::open_session;
use serde::{Deserialize, Serialize};
use ssotkit_sync::{ModelInstance, Params, SyncConfig, SyncError, SyncSession};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Kind of object write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Create a new object.
    Create,
    /// Update an existing object.
    Update,
    /// Delete an existing object.
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// One entry of a change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Change {
    /// Kind of write.
    pub action: Action,
    /// Model name.
    pub model: String,
    /// Identifier values.
    #[serde(default)]
    pub ids: Params,
    /// Attribute values; ignored by `delete`.
    #[serde(default)]
    pub attrs: Params,
}

/// A change that could not be applied.
#[derive(Debug, Error)]
#[error("change #{index} ({action} {model}): {source}")]
pub struct ChangeError {
    /// Position in the change set.
    pub index: usize,
    /// Kind of write.
    pub action: Action,
    /// Model name.
    pub model: String,
    /// Underlying write error.
    #[source]
    pub source: SyncError,
}

/// Options of the apply command.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Skip changes that fail on bad data instead of aborting.
    pub continue_on_error: bool,
    /// Roll back each failed object write.
    pub atomic: bool,
    /// Stamp written objects with this system of record.
    pub system_of_record: Option<String>,
}

impl ApplyOptions {
    fn sync_config(&self) -> SyncConfig {
        let config = SyncConfig::new().with_atomic_writes(self.atomic);
        match &self.system_of_record {
            Some(name) => config.with_system_of_record(name.clone()),
            None => config,
        }
    }
}

/// Result of applying a change set.
#[derive(Debug, Default)]
pub struct ApplySummary {
    /// Changes written.
    pub applied: usize,
    /// Changes skipped under `continue_on_error`.
    pub skipped: Vec<ChangeError>,
}

/// Parses a change set.
pub fn parse_changes(json: &str) -> Result<Vec<Change>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Applies one change through the session.
pub fn apply_change(session: &SyncSession, change: &Change) -> Result<ModelInstance, SyncError> {
    match change.action {
        Action::Create => session.create(&change.model, change.ids.clone(), change.attrs.clone()),
        Action::Update => session.update(&change.model, &change.ids, change.attrs.clone()),
        Action::Delete => session.delete(&change.model, &change.ids),
    }
}

/// Applies `changes` in order.
///
/// Data errors are collected and skipped when `continue_on_error` is set;
/// any other error aborts.
pub fn apply_all(
    session: &SyncSession,
    changes: &[Change],
    continue_on_error: bool,
) -> Result<ApplySummary, ChangeError> {
    let mut summary = ApplySummary::default();
    for (index, change) in changes.iter().enumerate() {
        match apply_change(session, change) {
            Ok(instance) => {
                debug!(
                    index,
                    action = %change.action,
                    model = %change.model,
                    unique_id = instance.unique_id(),
                    "applied change"
                );
                summary.applied += 1;
            }
            Err(source) => {
                let error = ChangeError {
                    index,
                    action: change.action,
                    model: change.model.clone(),
                    source,
                };
                if continue_on_error && error.source.is_data_error() {
                    warn!(%error, "skipping change");
                    summary.skipped.push(error);
                } else {
                    return Err(error);
                }
            }
        }
    }
    Ok(summary)
}

/// Runs the apply command.
///
/// The snapshot is only saved when the change set was applied without an
/// aborting error.
pub fn run(
    path: &Path,
    changes_path: &Path,
    options: &ApplyOptions,
) -> Result<ApplySummary, Box<dyn std::error::Error>> {
    let changes = parse_changes(&std::fs::read_to_string(changes_path)?)?;
    let session = open_session(path, options.sync_config())?;

    let summary = apply_all(&session, &changes, options.continue_on_error)?;
    session.store().save_snapshot()?;
    info!(
        path = %path.display(),
        applied = summary.applied,
        skipped = summary.skipped.len(),
        "applied change set"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init;
    use ssotkit_store::Value;

    const CHANGES: &str = r#"[
        { "action": "create", "model": "device",
          "ids": { "name": "sw1" },
          "attrs": { "status__name": "Active", "location__name": "dc1", "tags": [{ "name": "core" }] } },
        { "action": "create", "model": "device",
          "ids": { "name": "sw2" },
          "attrs": { "status__name": "Active", "location__name": "dc9" } },
        { "action": "update", "model": "device",
          "ids": { "name": "sw1" },
          "attrs": { "serial": "FOC123" } }
    ]"#;

    fn seeded_store(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("store.json");
        init::run(&path, true).unwrap();
        path
    }

    fn write_changes(dir: &tempfile::TempDir, json: &str) -> std::path::PathBuf {
        let path = dir.path().join("changes.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn parses_change_sets() {
        let changes = parse_changes(CHANGES).unwrap();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].action, Action::Create);
        assert_eq!(changes[2].attrs.get("serial"), Some(&Value::text("FOC123")));

        let delete = parse_changes(r#"[{ "action": "delete", "model": "tag", "ids": { "name": "lab" } }]"#)
            .unwrap();
        assert!(delete[0].attrs.is_empty());
    }

    #[test]
    fn rejects_unknown_actions_and_keys() {
        assert!(parse_changes(r#"[{ "action": "upsert", "model": "tag" }]"#).is_err());
        assert!(parse_changes(r#"[{ "action": "create", "model": "tag", "extra": 1 }]"#).is_err());
    }

    #[test]
    fn aborts_without_saving_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded_store(&dir);
        let changes = write_changes(&dir, CHANGES);

        let error = run(&path, &changes, &ApplyOptions::default()).unwrap_err();
        assert!(error.to_string().contains("change #1 (create device)"));

        let session = open_session(&path, SyncConfig::default()).unwrap();
        assert!(session.load("device").unwrap().is_empty());
    }

    #[test]
    fn continues_past_data_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded_store(&dir);
        let changes = write_changes(&dir, CHANGES);
        let options = ApplyOptions {
            continue_on_error: true,
            atomic: true,
            system_of_record: Some("ssot".into()),
        };

        let summary = run(&path, &changes, &options).unwrap();
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].index, 1);

        let session = open_session(&path, SyncConfig::default()).unwrap();
        let devices = session.load("device").unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].get("serial"), Some(&Value::text("FOC123")));
        assert_eq!(devices[0].get("location__name"), Some(&Value::text("dc1")));
    }

    #[test]
    fn configuration_errors_abort_even_when_continuing() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded_store(&dir);
        let changes = write_changes(
            &dir,
            r#"[{ "action": "create", "model": "rack", "ids": { "name": "r1" } }]"#,
        );
        let options = ApplyOptions {
            continue_on_error: true,
            ..ApplyOptions::default()
        };
        assert!(run(&path, &changes, &options).is_err());
    }
}
