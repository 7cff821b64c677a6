//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, init::InitArgs, match_parts::MatchArgs, parse::ParseArgs,
    parts::PartsCommands, rules::RulesCommands, solve::SolveArgs, store::StoreCommands,
    validate::ValidateArgs,
};

#[derive(Parser)]
#[command(name = "tasm")]
#[command(author, version, about = "Rule-based mechanical assembly reconstruction")]
#[command(long_about = "Matches catalog parts against declarative constraint rules, places every part of an assembly and exports a renderable scene.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .tasm/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new tasm project with a seed catalog
    Init(InitArgs),

    /// Parse a STEP file and list its part instances
    Parse(ParseArgs),

    /// Match two parts against the rule library
    Match(MatchArgs),

    /// Generate constraints, place every part and export a scene
    Solve(SolveArgs),

    /// Part catalog management
    #[command(subcommand)]
    Parts(PartsCommands),

    /// Rule library queries
    #[command(subcommand)]
    Rules(RulesCommands),

    /// SQLite catalog store maintenance
    #[command(subcommand)]
    Store(StoreCommands),

    /// Validate catalog records against schemas
    Validate(ValidateArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// JSON format (for programming)
    Json,
    /// Tab-separated values (for piping)
    Tsv,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}
