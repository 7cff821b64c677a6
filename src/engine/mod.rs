//! Assembly reconstruction engine
//!
//! Stages run in order: constraint generation (rule matching over catalog
//! pairs or adjacent exchange-file instances), placement solving, fastener
//! synthesis. [`EngineContext`] drives them for one run.

pub mod error;
pub mod fasteners;
pub mod generator;
pub mod matcher;
pub mod pipeline;
pub mod report;
pub mod solver;
pub mod warning;

pub use error::EngineError;
pub use fasteners::{synthesize, Synthesis};
pub use generator::{generate_catalog, generate_sequential};
pub use matcher::{best_match, match_parts, RuleMatch};
pub use pipeline::{AssemblyRun, EngineContext, Mode, Statistics};
pub use report::{PlacementReport, ReportEntry};
pub use solver::{PlacementSolver, PlacementState, SolveOutcome};
pub use warning::Warning;
