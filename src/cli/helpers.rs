//! Shared helper functions for CLI commands

use glam::DVec3;
use miette::Result;
use std::path::PathBuf;

use crate::cli::GlobalOpts;
use crate::core::{CatalogStore, Config, FileStore, Project, SqliteStore, StoreBackend};

/// Locate the project from `--project` or the current directory
pub fn open_project(global: &GlobalOpts) -> Result<Project> {
    let project = match &global.project {
        Some(path) => Project::discover_from(path),
        None => Project::discover(),
    };
    project.map_err(|e| miette::miette!("{}", e))
}

/// Open the catalog store selected in the configuration
///
/// The SQLite store is synced from the YAML records before use.
pub fn open_store(project: &Project, config: &Config) -> Result<Box<dyn CatalogStore>> {
    let files = FileStore::for_project(project);
    match config.store() {
        StoreBackend::Files => Ok(Box::new(files)),
        StoreBackend::Sqlite => {
            let store = SqliteStore::open_synced(&project.database_path(), &files)?;
            Ok(Box::new(store))
        }
    }
}

/// Mesh directory from the configuration, relative paths resolved against the root
pub fn mesh_dir(project: &Project, config: &Config) -> Option<PathBuf> {
    config.mesh_dir.as_ref().map(|dir| {
        if dir.is_relative() {
            project.root().join(dir)
        } else {
            dir.clone()
        }
    })
}

/// Format a vector as `(x, y, z)` with one decimal
pub fn format_vec(v: DVec3) -> String {
    format!("({:.1}, {:.1}, {:.1})", v.x, v.y, v.z)
}

/// Format an optional value, "-" when missing
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
