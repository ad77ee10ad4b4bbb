//! JSON snapshot persistence.
//!
//! A snapshot is the whole table set plus a format version. Writes go to a
//! temporary file in the destination directory which is then renamed over
//! the target, so a crash never leaves a half-written snapshot behind.

use crate::error::{StoreError, StoreResult};
use crate::tables::Tables;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub format_version: u16,
    pub tables: Tables,
}

pub(crate) fn read(path: &Path, expected_version: u16) -> StoreResult<Tables> {
    let bytes = fs::read(path)?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    if snapshot.format_version > expected_version {
        return Err(StoreError::invalid_format(format!(
            "snapshot version {} is newer than supported version {expected_version}",
            snapshot.format_version
        )));
    }
    Ok(snapshot.tables)
}

pub(crate) fn write(path: &Path, tables: &Tables, format_version: u16, pretty: bool) -> StoreResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let snapshot = SnapshotRef {
        format_version,
        tables,
    };
    let bytes = if pretty {
        serde_json::to_vec_pretty(&snapshot)?
    } else {
        serde_json::to_vec(&snapshot)?
    };

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(&bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    format_version: u16,
    tables: &'a Tables,
}
