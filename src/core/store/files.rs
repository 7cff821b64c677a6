//! YAML file store

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{sort_rules, CatalogStore, PartFilter, StoreError};
use crate::core::loader::{load_all, yaml_files};
use crate::core::Project;
use crate::entities::{ConstraintRule, PartRecord};

/// Catalog backed by the YAML records of a project
#[derive(Debug, Clone)]
pub struct FileStore {
    parts_dir: PathBuf,
    rules_dir: PathBuf,
}

impl FileStore {
    pub fn new(parts_dir: impl Into<PathBuf>, rules_dir: impl Into<PathBuf>) -> Self {
        Self {
            parts_dir: parts_dir.into(),
            rules_dir: rules_dir.into(),
        }
    }

    pub fn for_project(project: &Project) -> Self {
        Self::new(project.parts_dir(), project.rules_dir())
    }

    pub fn parts_dir(&self) -> &Path {
        &self.parts_dir
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Every record file, parts first, in load order
    pub fn source_files(&self) -> Vec<PathBuf> {
        let mut files = yaml_files(&self.parts_dir);
        files.extend(yaml_files(&self.rules_dir));
        files
    }

    /// All rules including inactive ones, in store order
    ///
    /// A rule id declared by more than one file keeps its first file.
    pub fn all_rules(&self) -> Vec<ConstraintRule> {
        let (rules, skipped) = load_all::<ConstraintRule>(&self.rules_dir);
        for file in skipped {
            tracing::warn!("skipping rule file {}: {}", file.path.display(), file.reason);
        }
        let mut rules = first_of_each(rules, "rule", |r| &r.rule_id);
        sort_rules(&mut rules);
        rules
    }

    /// All parts, sorted by part id
    ///
    /// A part id declared by more than one file keeps its first file.
    pub fn all_parts(&self) -> Vec<PartRecord> {
        let (parts, skipped) = load_all::<PartRecord>(&self.parts_dir);
        for file in skipped {
            tracing::warn!("skipping part file {}: {}", file.path.display(), file.reason);
        }
        let mut parts = first_of_each(parts, "part", |p| &p.part_id);
        parts.sort_by(|a, b| a.part_id.cmp(&b.part_id));
        parts
    }
}

/// Drop records whose id was already seen, in load order
fn first_of_each<T>(records: Vec<T>, kind: &str, id: impl Fn(&T) -> &String) -> Vec<T> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let fresh = seen.insert(id(record).clone());
            if !fresh {
                tracing::warn!("ignoring duplicate {} id '{}'", kind, id(record));
            }
            fresh
        })
        .collect()
}

impl CatalogStore for FileStore {
    fn active_rules(&self) -> Result<Vec<ConstraintRule>, StoreError> {
        Ok(self.all_rules().into_iter().filter(|r| r.active).collect())
    }

    fn parts(&self, filter: &PartFilter) -> Result<Vec<PartRecord>, StoreError> {
        Ok(self
            .all_parts()
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn store_with(
        parts: &[(&str, &str)],
        rules: &[(&str, &str)],
    ) -> (tempfile::TempDir, FileStore) {
        let tmp = tempdir().unwrap();
        let store = FileStore::new(tmp.path().join("parts"), tmp.path().join("rules"));
        fs::create_dir_all(store.parts_dir()).unwrap();
        fs::create_dir_all(store.rules_dir()).unwrap();
        for (name, body) in parts {
            fs::write(store.parts_dir().join(name), body).unwrap();
        }
        for (name, body) in rules {
            fs::write(store.rules_dir().join(name), body).unwrap();
        }
        (tmp, store)
    }

    #[test]
    fn test_inactive_rules_are_hidden() {
        let (_tmp, store) = store_with(
            &[],
            &[
                (
                    "a.yaml",
                    "rule_id: R-A\nname: a\npriority: 3\ncondition:\n  type: thread_match\naction:\n  type: SCREW\n",
                ),
                (
                    "b.yaml",
                    "rule_id: R-B\nname: b\npriority: 7\nactive: false\ncondition:\n  type: thread_match\naction:\n  type: SCREW\n",
                ),
            ],
        );
        let rules = store.active_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_id, "R-A");
        assert_eq!(store.all_rules().len(), 2);
    }

    #[test]
    fn test_parts_sorted_and_bad_files_skipped() {
        let (_tmp, store) = store_with(
            &[
                ("z.yaml", "part_id: A-1\nfamily: pipe\n"),
                ("a.yaml", "part_id: B-1\nfamily: flange\n"),
                ("bad.yaml", "family: [\n"),
            ],
            &[],
        );
        let parts = store.parts(&PartFilter::default()).unwrap();
        let ids: Vec<_> = parts.iter().map(|p| p.part_id.as_str()).collect();
        assert_eq!(ids, vec!["A-1", "B-1"]);
    }

    #[test]
    fn test_duplicate_part_ids_keep_first_file() {
        let (_tmp, store) = store_with(
            &[
                ("a.yaml", "part_id: FL-1
family: flange
dn: 50
"),
                ("b.yaml", "part_id: FL-1
family: flange
dn: 80
"),
                ("c.yaml", "part_id: PIPE-1
family: pipe
"),
            ],
            &[],
        );
        let parts = store.all_parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].part_id, "FL-1");
        assert_eq!(parts[0].dn, Some(50));
    }

    #[test]
    fn test_duplicate_rule_ids_keep_first_file() {
        let (_tmp, store) = store_with(
            &[],
            &[
                (
                    "a.yaml",
                    "rule_id: R-A\nname: first\npriority: 3\ncondition:\n  type: thread_match\naction:\n  type: SCREW\n",
                ),
                (
                    "b.yaml",
                    "rule_id: R-A\nname: second\npriority: 9\ncondition:\n  type: thread_match\naction:\n  type: SCREW\n",
                ),
            ],
        );
        let rules = store.all_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "first");
    }
}
