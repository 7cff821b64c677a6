//! `tasm match` command - Score a part pair against the rule library

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::{open_project, open_store};
use crate::cli::table::Table;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{CatalogStore, Config, PartFilter};
use crate::engine::matcher::{best_match, match_parts};
use crate::entities::{ConstraintType, PartRecord};

#[derive(clap::Args, Debug)]
pub struct MatchArgs {
    /// First part: catalog part id, or a product name such as "Bolt M8x20"
    pub part_a: String,

    /// Second part
    pub part_b: String,

    /// List every applicable rule instead of the best one
    #[arg(long)]
    pub all: bool,
}

#[derive(Serialize)]
struct MatchRow {
    rule_id: String,
    name: String,
    constraint_type: ConstraintType,
    priority: i32,
    confidence: f64,
}

pub fn run(args: MatchArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let config = Config::load_for(Some(&project));
    let store = open_store(&project, &config)?;

    let rules = store.active_rules()?;
    let a = resolve(store.as_ref(), &args.part_a)?;
    let b = resolve(store.as_ref(), &args.part_b)?;

    let policy = config.policy();
    let matches = match_parts(&a, &b, &rules, &policy.matching);
    let selected: Vec<_> = if args.all {
        matches
    } else {
        best_match(&matches).into_iter().collect()
    };

    let rows: Vec<MatchRow> = selected
        .iter()
        .map(|m| MatchRow {
            rule_id: m.rule.rule_id.clone(),
            name: m.rule.name.clone(),
            constraint_type: m.rule.action.constraint_type,
            priority: m.rule.priority,
            confidence: m.confidence,
        })
        .collect();

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&rows).into_diagnostic()?);
        }
        format => {
            if rows.is_empty() {
                if !global.quiet {
                    println!(
                        "{} No rule applies to {} and {}",
                        style("!").yellow(),
                        style(a.display_name()).cyan(),
                        style(b.display_name()).cyan()
                    );
                }
                return Ok(());
            }
            let mut table = Table::new(&["RULE", "TYPE", "PRIORITY", "CONFIDENCE", "NAME"]);
            for row in &rows {
                table.push(vec![
                    row.rule_id.clone(),
                    row.constraint_type.to_string(),
                    row.priority.to_string(),
                    format!("{:.2}", row.confidence),
                    row.name.clone(),
                ]);
            }
            table.print(format, "match", global.quiet);
        }
    }

    Ok(())
}

/// Catalog record for the id, or a record inferred from the text as a product name
fn resolve(store: &dyn CatalogStore, id: &str) -> Result<PartRecord> {
    let found = store.parts(&PartFilter::ids([id]))?;
    Ok(found
        .into_iter()
        .next()
        .unwrap_or_else(|| {
            tracing::debug!("{} is not in the catalog; inferring from its name", id);
            PartRecord::from_product_name(id)
        }))
}
