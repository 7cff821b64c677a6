//! Record loading utilities
//!
//! Generic helpers for reading YAML records from a directory tree.

use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file that could not be turned into a record
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Load all records of type T below a directory
///
/// Walks the tree in file-name order and deserializes every `.yaml` / `.yml`
/// file. Files that fail to read or parse are returned as skipped rather
/// than aborting the load.
pub fn load_all<T: DeserializeOwned>(dir: &Path) -> (Vec<T>, Vec<SkippedFile>) {
    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for path in yaml_files(dir) {
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_yml::from_str::<T>(&content).map_err(|e| e.to_string()));

        match parsed {
            Ok(record) => records.push(record),
            Err(reason) => skipped.push(SkippedFile { path, reason }),
        }
    }

    (records, skipped)
}

/// All YAML files below a directory, sorted by path
pub fn yaml_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }

    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map_or(false, |ext| ext == "yaml" || ext == "yml")
        })
        .map(|e| e.path().to_path_buf())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_all_nonexistent_dir() {
        let (records, skipped): (Vec<serde_json::Value>, _) =
            load_all(Path::new("/nonexistent/path"));
        assert!(records.is_empty());
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_load_all_reports_bad_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.yaml"), "part_id: A\n").unwrap();
        fs::write(dir.path().join("nested/b.yml"), "part_id: B\n").unwrap();
        fs::write(dir.path().join("broken.yaml"), "part_id: [unclosed\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let (records, skipped): (Vec<crate::entities::PartRecord>, _) = load_all(dir.path());
        let ids: Vec<_> = records.iter().map(|r| r.part_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].path.ends_with("broken.yaml"));
    }
}
