//! `tasm validate` command - Validate catalog records against schemas

use console::style;
use miette::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cli::helpers::open_project;
use crate::cli::GlobalOpts;
use crate::core::FileStore;
use crate::entities::{Condition, ConstraintRule, PartRecord};
use crate::schema::{RecordKind, Validator};

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Paths to validate (default: the whole catalog)
    #[arg()]
    pub paths: Vec<PathBuf>,

    /// Continue validation after first error
    #[arg(long)]
    pub keep_going: bool,

    /// Show summary only, don't show individual errors
    #[arg(long)]
    pub summary: bool,
}

/// Validation statistics
#[derive(Debug, Default)]
struct ValidationStats {
    files_checked: usize,
    files_passed: usize,
    files_failed: usize,
    total_errors: usize,
}

pub fn run(args: ValidateArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let validator = Validator::default();

    let files = if args.paths.is_empty() {
        FileStore::for_project(&project).source_files()
    } else {
        expand_paths(&args.paths)
    };

    let mut stats = ValidationStats::default();
    let mut seen = SeenIds::default();
    let mut had_error = false;

    if !global.quiet {
        println!(
            "{} Validating {} file(s)...\n",
            style("→").blue(),
            files.len()
        );
    }

    for path in &files {
        let issues = match validator.validate_file(path) {
            Ok(None) => {
                if !args.summary && !global.quiet {
                    println!(
                        "{} {} - not in a parts/ or rules/ directory (skipped)",
                        style("?").yellow(),
                        path.display()
                    );
                }
                continue;
            }
            Ok(Some(Ok(()))) => semantic_issues(path, &mut seen),
            Ok(Some(Err(e))) => {
                stats.files_checked += 1;
                stats.files_failed += 1;
                stats.total_errors += e.violation_count();
                had_error = true;

                if !args.summary {
                    println!(
                        "{} {} - {} error(s)",
                        style("✗").red(),
                        path.display(),
                        e.violation_count()
                    );
                    println!("{:?}", miette::Report::new(e));
                }

                if !args.keep_going {
                    break;
                }
                continue;
            }
            Err(e) => vec![e.to_string()],
        };

        stats.files_checked += 1;
        if issues.is_empty() {
            stats.files_passed += 1;
            if !args.summary && !global.quiet {
                println!("{} {}", style("✓").green(), path.display());
            }
            continue;
        }

        stats.files_failed += 1;
        stats.total_errors += issues.len();
        had_error = true;
        if !args.summary {
            println!(
                "{} {} - {} error(s)",
                style("✗").red(),
                path.display(),
                issues.len()
            );
            for issue in &issues {
                println!("    {}", style(issue).red());
            }
        }
        if !args.keep_going {
            break;
        }
    }

    println!();
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", style("Validation Summary").bold());
    println!("{}", style("─".repeat(60)).dim());
    println!("  Files checked:  {}", style(stats.files_checked).cyan());
    println!("  Files passed:   {}", style(stats.files_passed).green());
    println!("  Files failed:   {}", style(stats.files_failed).red());
    println!("  Total errors:   {}", style(stats.total_errors).red());
    println!();

    if had_error {
        if stats.files_failed == 1 {
            Err(miette::miette!("Validation failed: 1 file has errors"))
        } else {
            Err(miette::miette!(
                "Validation failed: {} files have errors",
                stats.files_failed
            ))
        }
    } else {
        println!("{} All files passed validation!", style("✓").green().bold());
        Ok(())
    }
}

/// Record ids already seen, with the file that declared them
#[derive(Debug, Default)]
struct SeenIds {
    parts: HashMap<String, PathBuf>,
    rules: HashMap<String, PathBuf>,
}

/// Checks a schema-valid record cannot express
fn semantic_issues(path: &Path, seen: &mut SeenIds) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut issues = Vec::new();

    match RecordKind::from_path(path) {
        Some(RecordKind::Part) => {
            if let Ok(part) = serde_yml::from_str::<PartRecord>(&content) {
                if let Some(first) = seen.parts.insert(part.part_id.clone(), path.to_path_buf()) {
                    issues.push(format!(
                        "duplicate part_id '{}' (also in {})",
                        part.part_id,
                        first.display()
                    ));
                }
            }
        }
        Some(RecordKind::Rule) => {
            if let Ok(rule) = serde_yml::from_str::<ConstraintRule>(&content) {
                if let Some(first) = seen.rules.insert(rule.rule_id.clone(), path.to_path_buf()) {
                    issues.push(format!(
                        "duplicate rule_id '{}' (also in {})",
                        rule.rule_id,
                        first.display()
                    ));
                }
                if let Condition::DistanceRange { min, max } = rule.condition {
                    if min > max {
                        issues.push(format!(
                            "distance_range min ({}) is greater than max ({})",
                            min, max
                        ));
                    }
                }
            }
        }
        None => {}
    }

    issues
}

/// Expand paths - if a directory is given, find all YAML files in it
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let is_yaml = entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "yaml" || ext == "yml");
                if is_yaml {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.exists() {
            files.push(path.clone());
        }
    }

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_duplicate_part_ids() {
        let tmp = tempdir().unwrap();
        let parts = tmp.path().join("parts");
        std::fs::create_dir_all(&parts).unwrap();
        let a = parts.join("a.yaml");
        let b = parts.join("b.yaml");
        std::fs::write(&a, "part_id: P-1\nfamily: pipe\n").unwrap();
        std::fs::write(&b, "part_id: P-1\nfamily: pipe\n").unwrap();

        let mut seen = SeenIds::default();
        assert!(semantic_issues(&a, &mut seen).is_empty());
        let issues = semantic_issues(&b, &mut seen);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("duplicate part_id 'P-1'"));
    }

    #[test]
    fn test_inverted_distance_range() {
        let tmp = tempdir().unwrap();
        let rules = tmp.path().join("rules");
        std::fs::create_dir_all(&rules).unwrap();
        let path = rules.join("r.yaml");
        std::fs::write(
            &path,
            "rule_id: R-NEAR\nname: Near\npriority: 10\ncondition:\n  type: distance_range\n  min: 50.0\n  max: 10.0\naction:\n  type: FIXED\n",
        )
        .unwrap();

        let issues = semantic_issues(&path, &mut SeenIds::default());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("min (50) is greater than max (10)"));
    }

    #[test]
    fn test_expand_paths_finds_yaml() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("a.yaml"), "x: 1").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        let files = expand_paths(&[tmp.path().to_path_buf()]);
        assert_eq!(files.len(), 1);
    }
}
