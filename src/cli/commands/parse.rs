//! `tasm parse` command - Inspect a STEP file

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::helpers::{format_vec, or_dash};
use crate::cli::table::Table;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::PartInstance;
use crate::step::{self, FileKind};

#[derive(clap::Args, Debug)]
pub struct ParseArgs {
    /// STEP file (ISO 10303-21)
    pub file: PathBuf,
}

#[derive(Serialize)]
struct ParseSummary {
    file: String,
    kind: FileKind,
    entities: usize,
    products: usize,
    placements: usize,
    usages: usize,
    instances: Vec<PartInstance>,
}

pub fn run(args: ParseArgs, global: &GlobalOpts) -> Result<()> {
    let text = step::read_file(&args.file);
    let assembly = step::parse(&text);
    let instances = step::extract_instances(&assembly);

    let summary = ParseSummary {
        file: args.file.display().to_string(),
        kind: assembly.kind(),
        entities: assembly.entity_count,
        products: assembly.products.len(),
        placements: assembly.placements.len(),
        usages: assembly.usages.len(),
        instances,
    };

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&summary).into_diagnostic()?);
        }
        format => {
            if matches!(format, OutputFormat::Auto | OutputFormat::Md) && !global.quiet {
                println!(
                    "{} {} ({}): {} entities, {} products, {} placements, {} usages",
                    style("→").blue(),
                    style(&summary.file).cyan(),
                    summary.kind,
                    summary.entities,
                    summary.products,
                    summary.placements,
                    summary.usages
                );
                println!();
            }

            let mut table =
                Table::new(&["INSTANCE", "PART", "FAMILY", "DN", "POSITION", "ROTATION"]);
            for inst in &summary.instances {
                table.push(vec![
                    inst.instance_id.clone(),
                    inst.part_id.clone(),
                    inst.family.to_string(),
                    or_dash(inst.dn),
                    format_vec(inst.position),
                    format_vec(inst.rotation),
                ]);
            }
            table.print(format, "instance", global.quiet);
        }
    }

    Ok(())
}
