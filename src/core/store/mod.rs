//! Catalog and rule stores
//!
//! The engine reads parts and rules through [`CatalogStore`]. Two backends
//! exist: [`FileStore`] over the YAML records of a project, and
//! [`SqliteStore`], a local database synced from those records.

mod files;
mod sqlite;

pub use files::FileStore;
pub use sqlite::{SqliteStore, StoreInfo, SyncStats};

use miette::Diagnostic;
use thiserror::Error;

use crate::entities::{ConstraintRule, PartFamily, PartRecord};

/// Selection of parts to load
#[derive(Debug, Clone, Default)]
pub struct PartFilter {
    /// Only these part ids (empty = all)
    pub ids: Vec<String>,
    pub family: Option<PartFamily>,
    /// Case-insensitive substring of id or name
    pub search: Option<String>,
}

impl PartFilter {
    pub fn ids(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn matches(&self, part: &PartRecord) -> bool {
        if !self.ids.is_empty() && !self.ids.iter().any(|id| id == &part.part_id) {
            return false;
        }
        if let Some(family) = self.family {
            if part.family != family {
                return false;
            }
        }
        if let Some(ref search) = self.search {
            let needle = search.to_lowercase();
            let hit = part.part_id.to_lowercase().contains(&needle)
                || part.display_name().to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Read access to the part catalog and the rule library
pub trait CatalogStore {
    /// Active rules, priority descending then rule id
    fn active_rules(&self) -> Result<Vec<ConstraintRule>, StoreError>;

    /// Parts matching the filter, sorted by part id
    fn parts(&self, filter: &PartFilter) -> Result<Vec<PartRecord>, StoreError>;
}

/// Orders rules the way every store returns them
pub(crate) fn sort_rules(rules: &mut [ConstraintRule]) {
    rules.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
}

/// Errors raised by catalog stores
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("catalog I/O error: {0}")]
    #[diagnostic(code(tasm::store::io))]
    Io(#[from] std::io::Error),

    #[error("catalog database error: {0}")]
    #[diagnostic(
        code(tasm::store::database),
        help("run 'tasm store sync' to rebuild the database")
    )]
    Database(#[from] rusqlite::Error),

    #[error("malformed record in catalog database ({id}): {reason}")]
    #[diagnostic(code(tasm::store::record))]
    Record { id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Condition, ConstraintType};

    #[test]
    fn test_filter_matches() {
        let part = PartRecord::new("FL-50", PartFamily::Flange).with_name("Weld neck flange");
        assert!(PartFilter::default().matches(&part));
        assert!(PartFilter::ids(["FL-50"]).matches(&part));
        assert!(!PartFilter::ids(["FL-80"]).matches(&part));

        let by_family = PartFilter {
            family: Some(PartFamily::Bolt),
            ..Default::default()
        };
        assert!(!by_family.matches(&part));

        let by_search = PartFilter {
            search: Some("NECK".into()),
            ..Default::default()
        };
        assert!(by_search.matches(&part));
    }

    #[test]
    fn test_sort_rules_priority_then_id() {
        let mut rules = vec![
            ConstraintRule::new("R-B", "b", 5, Condition::ThreadMatch, ConstraintType::Screw),
            ConstraintRule::new("R-C", "c", 10, Condition::ThreadMatch, ConstraintType::Screw),
            ConstraintRule::new("R-A", "a", 5, Condition::ThreadMatch, ConstraintType::Screw),
        ];
        sort_rules(&mut rules);
        let ids: Vec<_> = rules.iter().map(|r| r.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["R-C", "R-A", "R-B"]);
    }
}
