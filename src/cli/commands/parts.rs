//! `tasm parts` command - Part catalog listing and CSV import

use clap::Subcommand;
use console::style;
use csv::{ReaderBuilder, StringRecord};
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use crate::cli::helpers::{open_project, open_store, or_dash, truncate_str};
use crate::cli::table::Table;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{Config, PartFilter, Project};
use crate::entities::{PartFamily, PartRecord};

#[derive(Subcommand, Debug)]
pub enum PartsCommands {
    /// List catalog parts
    List(ListArgs),

    /// Import parts from CSV
    ///
    /// Columns: part_id,name,family,dn,pn,end_type,face_type,thread
    Import(ImportArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only parts of this family
    #[arg(long)]
    pub family: Option<PartFamily>,

    /// Only parts whose id or name contains this text
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// CSV file to import
    pub file: PathBuf,

    /// Show what would be written without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Continue past rows with errors
    #[arg(long)]
    pub skip_errors: bool,

    /// Overwrite parts that already exist
    #[arg(long)]
    pub force: bool,
}

/// Import statistics
#[derive(Debug, Default, PartialEq)]
pub struct ImportStats {
    pub rows_processed: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub fn run(cmd: PartsCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        PartsCommands::List(args) => run_list(args, global),
        PartsCommands::Import(args) => run_import(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let config = Config::load_for(Some(&project));
    let store = open_store(&project, &config)?;

    let filter = PartFilter {
        family: args.family,
        search: args.search,
        ..Default::default()
    };
    let parts = store.parts(&filter)?;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&parts).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&parts).into_diagnostic()?);
        }
        format => {
            let mut table = Table::new(&["ID", "FAMILY", "DN", "PN", "THREAD", "NAME"]);
            for part in &parts {
                table.push(vec![
                    part.part_id.clone(),
                    part.family.to_string(),
                    or_dash(part.dn),
                    or_dash(part.pn),
                    or_dash(part.thread_descriptor()),
                    truncate_str(part.display_name(), 40),
                ]);
            }
            table.print(format, "part", global.quiet);
        }
    }

    Ok(())
}

fn run_import(args: ImportArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let file = File::open(&args.file).into_diagnostic()?;
    let stats = import_parts(&project, BufReader::new(file), &args)?;

    if !global.quiet {
        let verb = if args.dry_run { "Would import" } else { "Imported" };
        println!(
            "{} {} {} part(s) from {} row(s)",
            style("✓").green(),
            verb,
            stats.created + stats.updated,
            stats.rows_processed
        );
        if stats.updated > 0 {
            println!("  Updated: {}", style(stats.updated).yellow());
        }
        if stats.skipped > 0 {
            println!(
                "  Skipped: {} (already present, use --force to overwrite)",
                style(stats.skipped).yellow()
            );
        }
        if stats.errors > 0 {
            println!("  Errors:  {}", style(stats.errors).red());
        }
    }

    Ok(())
}

/// Read CSV rows and write one YAML record per part
pub fn import_parts<R: std::io::Read>(
    project: &Project,
    reader: R,
    args: &ImportArgs,
) -> Result<ImportStats> {
    let mut stats = ImportStats::default();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().into_diagnostic()?.clone();
    let header_map = build_header_map(&headers);
    if !header_map.contains_key("part_id") {
        return Err(miette::miette!(
            "CSV header must contain a part_id column (found: {})",
            headers.iter().collect::<Vec<_>>().join(",")
        ));
    }

    for (row_idx, result) in rdr.records().enumerate() {
        let row_num = row_idx + 2;
        stats.rows_processed += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {}", e))
            .and_then(|record| record_from_row(&record, &header_map));
        let part = match parsed {
            Ok(part) => part,
            Err(reason) => {
                eprintln!("{} Row {}: {}", style("✗").red(), row_num, reason);
                stats.errors += 1;
                if !args.skip_errors {
                    return Err(miette::miette!("Import failed at row {}: {}", row_num, reason));
                }
                continue;
            }
        };

        let path = project.part_path(&part.part_id);
        let exists = path.exists();
        if exists && !args.force {
            stats.skipped += 1;
            continue;
        }

        if args.dry_run {
            println!("{} {}", style("→").blue(), path.display());
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).into_diagnostic()?;
            }
            let yaml = serde_yml::to_string(&part).into_diagnostic()?;
            std::fs::write(&path, yaml).into_diagnostic()?;
            tracing::debug!("wrote {}", path.display());
        }

        if exists {
            stats.updated += 1;
        } else {
            stats.created += 1;
        }
    }

    Ok(stats)
}

/// Build a map from header name to column index
fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_lowercase().trim().to_string(), i))
        .collect()
}

fn get_field(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    field: &str,
) -> Option<String> {
    header_map
        .get(field)
        .and_then(|&idx| record.get(idx))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn record_from_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> std::result::Result<PartRecord, String> {
    let field = |name: &str| get_field(record, header_map, name);
    let number = |name: &str| -> std::result::Result<Option<u32>, String> {
        field(name)
            .map(|v| {
                v.parse::<u32>()
                    .map_err(|_| format!("{} '{}' is not a whole number", name, v))
            })
            .transpose()
    };

    let part_id = field("part_id").ok_or("missing required field 'part_id'")?;
    let name = field("name");
    let family = match field("family") {
        Some(f) => f.parse()?,
        None => PartFamily::infer(name.as_deref().unwrap_or(&part_id)),
    };

    let mut part = PartRecord::new(part_id, family);
    part.name = name;
    part.dn = number("dn")?;
    part.pn = number("pn")?;
    part.end_type = field("end_type");
    part.face_type = field("face_type");
    if let Some(thread) = field("thread") {
        part.metadata.insert("thread".to_string(), thread);
    }
    Ok(part)
}
