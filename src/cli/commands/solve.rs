//! `tasm solve` command - Assemble parts and export a scene
//!
//! Without a STEP file every catalog part matching the filters is assembled
//! (catalog mode). With one, its instances are assembled in file order
//! (exchange mode).

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::helpers::{format_vec, mesh_dir, open_project, open_store};
use crate::cli::table::Table;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{Config, PartFilter};
use crate::engine::{AssemblyRun, EngineContext};
use crate::entities::{PartFamily, PlacementSource};
use crate::scene::{MeshCache, MeshSource};
use crate::step;

#[derive(clap::Args, Debug)]
pub struct SolveArgs {
    /// STEP file to assemble (default: the catalog selection)
    pub file: Option<PathBuf>,

    /// Only these catalog parts (comma-separated ids)
    #[arg(long, value_delimiter = ',')]
    pub parts: Vec<String>,

    /// Only catalog parts of this family
    #[arg(long)]
    pub family: Option<PartFamily>,

    /// Only catalog parts whose id or name contains this text
    #[arg(long)]
    pub search: Option<String>,

    /// Write the scene description JSON here
    #[arg(long, short = 's')]
    pub scene: Option<PathBuf>,

    /// Directory of <part_id>.mesh.json files (overrides configuration)
    #[arg(long)]
    pub mesh_dir: Option<PathBuf>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Also list the generated constraints
    #[arg(long)]
    pub constraints: bool,
}

pub fn run(args: SolveArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let config = Config::load_for(Some(&project));
    let store = open_store(&project, &config)?;

    let filter = PartFilter {
        ids: args.parts.clone(),
        family: args.family,
        search: args.search.clone(),
    };
    let mut context = EngineContext::load(store.as_ref(), &filter, config.policy())?;
    if let Some(secs) = args.timeout {
        context = context.with_timeout(Duration::from_secs(secs));
    }

    let mut run = match &args.file {
        Some(path) => {
            let text = step::read_file(path);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            context.run_exchange(&text, &name)?
        }
        None => context.run_catalog()?,
    };

    let meshes = args
        .mesh_dir
        .clone()
        .or_else(|| mesh_dir(&project, &config))
        .map(MeshCache::new);
    let scene = run.export_scene(meshes.as_ref().map(|m| m as &dyn MeshSource));

    if let Some(path) = &args.scene {
        let json = serde_json::to_string_pretty(&scene).into_diagnostic()?;
        std::fs::write(path, json).into_diagnostic()?;
        if !global.quiet {
            eprintln!(
                "{} Wrote scene with {} object(s) to {}",
                style("✓").green(),
                scene.objects.len(),
                style(path.display()).cyan()
            );
        }
    }

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&run).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&run).into_diagnostic()?);
        }
        format => print_run(&run, format, args.constraints, global.quiet),
    }

    Ok(())
}

fn print_run(run: &AssemblyRun, format: OutputFormat, constraints: bool, quiet: bool) {
    let human = matches!(format, OutputFormat::Auto | OutputFormat::Md);

    if constraints {
        let mut table = Table::new(&["ID", "A", "B", "TYPE", "RULE", "CONFIDENCE"]);
        for c in &run.constraints {
            table.push(vec![
                c.constraint_id.clone(),
                c.entity_a.clone(),
                c.entity_b.clone(),
                c.constraint_type.to_string(),
                c.rule_id.clone(),
                format!("{:.2}", c.confidence),
            ]);
        }
        table.print(format, "constraint", quiet);
        if human {
            println!();
        }
    }

    let mut table = Table::new(&["INSTANCE", "PART", "POSITION", "ROTATION", "SOURCE"]);
    for (inst, placement) in run
        .instances
        .iter()
        .filter_map(|i| run.placement(&i.instance_id).map(|p| (i, p)))
    {
        let source = match &placement.source {
            PlacementSource::Base => "base".to_string(),
            PlacementSource::Constraint { constraint_id, from } => {
                format!("{} from {}", constraint_id, from)
            }
            PlacementSource::Fallback { slot } => format!("fallback slot {}", slot),
            PlacementSource::Synthesized { connection_id } => {
                format!("synthesized for {}", connection_id)
            }
        };
        table.push(vec![
            inst.instance_id.clone(),
            inst.part_id.clone(),
            format_vec(placement.position),
            format_vec(placement.rotation),
            source,
        ]);
    }
    table.print(format, "placement", quiet);

    if human && !quiet {
        let stats = &run.statistics;
        println!(
            "{} {} mode: {} constraint(s), {} placed by constraint, {} fallback, {} synthesized",
            style("→").blue(),
            run.mode,
            stats.constraints,
            stats.placed_by_constraint,
            stats.fallback,
            stats.synthesized
        );
    }

    if !quiet {
        for warning in &run.warnings {
            eprintln!("{} {}", style("!").yellow(), warning);
        }
    }
}
