//! ssotkit CLI
//!
//! Command-line tools for ssotkit stores.
//!
//! # Commands
//!
//! - `init` - Create a store with the network schema
//! - `apply` - Apply a JSON change set through a sync session
//! - `load` - Load and print the instances of a model
//! - `inspect` - Display store statistics

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ssotkit command-line tools.
#[derive(Parser)]
#[command(name = "ssotkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store snapshot
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a store with the network schema
    Init {
        /// Also create seed rows (statuses, tags, sites, tenants)
        #[arg(short, long)]
        seed: bool,
    },

    /// Apply a JSON change set and save the store
    Apply {
        /// Path to the change set
        #[arg(short, long)]
        changes: PathBuf,

        /// Skip changes that fail on bad data instead of aborting
        #[arg(long)]
        continue_on_error: bool,

        /// Roll back each failed object write
        #[arg(long)]
        atomic: bool,

        /// Stamp written objects with this system of record
        #[arg(long, value_name = "NAME")]
        system_of_record: Option<String>,
    },

    /// Load and print the instances of a model
    Load {
        /// Model name
        #[arg(short, long)]
        model: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Display store statistics
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Init { seed } => {
            let path = cli.path.ok_or("Store path required for init")?;
            commands::init::run(&path, seed)?;
        }
        Commands::Apply {
            changes,
            continue_on_error,
            atomic,
            system_of_record,
        } => {
            let path = cli.path.ok_or("Store path required for apply")?;
            let options = commands::apply::ApplyOptions {
                continue_on_error,
                atomic,
                system_of_record,
            };
            let summary = commands::apply::run(&path, &changes, &options)?;
            println!(
                "Applied {} change(s), skipped {}",
                summary.applied,
                summary.skipped.len()
            );
            for skipped in &summary.skipped {
                println!("  {skipped}");
            }
        }
        Commands::Load { model, format } => {
            let path = cli.path.ok_or("Store path required for load")?;
            commands::load::run(&path, &model, format)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, format)?;
        }
        Commands::Version => {
            println!("ssotkit CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ssotkit sync v{}", ssotkit_sync::VERSION);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn format_accepts_text_and_json_only() {
        let parse = |format: &str| {
            Cli::try_parse_from(["ssotkit", "-p", "store.json", "load", "-m", "device", "-f", format])
        };
        match parse("json").unwrap().command {
            Commands::Load { format, .. } => assert_eq!(format, OutputFormat::Json),
            _ => panic!("expected load"),
        }
        assert!(parse("yaml").is_err());

        match Cli::try_parse_from(["ssotkit", "-p", "store.json", "inspect"]).unwrap().command {
            Commands::Inspect { format } => assert_eq!(format, OutputFormat::Text),
            _ => panic!("expected inspect"),
        }
    }
}
