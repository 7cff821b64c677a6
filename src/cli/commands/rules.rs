//! `tasm rules` command - Inspect the rule library

use clap::Subcommand;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{open_project, open_store, truncate_str};
use crate::cli::table::Table;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{Config, FileStore};
use crate::entities::ConstraintRule;

#[derive(Subcommand, Debug)]
pub enum RulesCommands {
    /// List rules in evaluation order
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Include inactive rules (read from the YAML records)
    #[arg(long)]
    pub all: bool,
}

pub fn run(cmd: RulesCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        RulesCommands::List(args) => run_list(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let rules: Vec<ConstraintRule> = if args.all {
        FileStore::for_project(&project).all_rules()
    } else {
        let config = Config::load_for(Some(&project));
        open_store(&project, &config)?.active_rules()?
    };

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rules).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&rules).into_diagnostic()?);
        }
        format => {
            let mut table = Table::new(&["ID", "PRIORITY", "CONDITION", "TYPE", "ACTIVE", "NAME"]);
            for rule in &rules {
                table.push(vec![
                    rule.rule_id.clone(),
                    rule.priority.to_string(),
                    rule.condition.kind().to_string(),
                    rule.action.constraint_type.to_string(),
                    if rule.active { "yes" } else { "no" }.to_string(),
                    truncate_str(&rule.name, 40),
                ]);
            }
            table.print(format, "rule", global.quiet);
        }
    }

    Ok(())
}
