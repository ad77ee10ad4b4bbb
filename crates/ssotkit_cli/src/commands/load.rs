//! Load command implementation.

use super::{open_session, OutputFormat};
use ssotkit_sync::{ModelInstance, SyncConfig};
use std::fmt::Write;
use std::path::Path;

/// Runs the load command.
pub fn run(path: &Path, model: &str, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(path, SyncConfig::default())?;
    let mut instances = session.load(model)?;
    instances.sort_by(|a, b| a.unique_id().cmp(b.unique_id()));

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&instances)?);
    } else {
        print!("{}", render_text(model, &instances));
    }
    Ok(())
}

/// Renders instances one block per object, identifiers first.
pub fn render_text(model: &str, instances: &[ModelInstance]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{model}: {} instance(s)", instances.len());
    for instance in instances {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", instance.unique_id());
        for (field, value) in instance.identifiers().iter().chain(&instance.attributes) {
            let _ = writeln!(out, "  {field}: {value}");
        }
        if !instance.flags.is_empty() {
            let _ = writeln!(out, "  (flags: {:?})", instance.flags);
        }
    }
    out
}
