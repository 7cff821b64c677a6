//! `tasm store` command - Manage the catalog database
//!
//! The database under `.tasm/catalog.db` is derived from the YAML records
//! and is rebuilt whenever they change.

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::open_project;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{FileStore, SqliteStore};

#[derive(Subcommand, Debug)]
pub enum StoreCommands {
    /// Sync the database with the YAML records
    Sync,

    /// Show database statistics
    Info,
}

pub fn run(cmd: StoreCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        StoreCommands::Sync => run_sync(global),
        StoreCommands::Info => run_info(global),
    }
}

fn run_sync(global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let mut store = SqliteStore::open(&project.database_path())?;
    let stats = store.sync_from(&FileStore::for_project(&project))?;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&stats).into_diagnostic()?);
        }
        _ => {
            if global.quiet {
                return Ok(());
            }
            if stats.rebuilt {
                println!(
                    "{} Catalog database rebuilt in {}ms",
                    style("✓").green(),
                    stats.duration_ms
                );
                println!("  Files scanned: {}", stats.files_scanned);
                println!("  Parts:         {}", style(stats.parts).cyan());
                println!("  Rules:         {}", style(stats.rules).cyan());
            } else {
                println!("{} Catalog database is up to date", style("✓").green());
            }
        }
    }

    Ok(())
}

fn run_info(global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = SqliteStore::open(&project.database_path())?;
    let info = store.info()?;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&info).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&info).into_diagnostic()?);
        }
        _ => {
            println!("{}", style("Catalog Database").bold());
            println!("{}", style("─".repeat(40)).dim());
            println!("  Location:       {}", info.path.display());
            println!("  Schema version: {}", info.schema_version);
            println!("  Parts:          {}", style(info.parts).cyan());
            println!(
                "  Rules:          {} ({} active)",
                style(info.rules).cyan(),
                info.active_rules
            );
            println!(
                "  Last sync:      {}",
                info.synced_at.as_deref().unwrap_or("never")
            );
            println!(
                "  Database size:  {} KB",
                style(info.db_size_bytes / 1024).cyan()
            );
            if info.synced_at.is_none() {
                println!();
                println!(
                    "Run {} to populate the database",
                    style("tasm store sync").yellow()
                );
            }
        }
    }

    Ok(())
}
