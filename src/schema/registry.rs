//! Embedded JSON schemas for catalog records

use rust_embed::Embed;
use std::path::Path;

#[derive(Embed)]
#[folder = "schemas/"]
struct EmbeddedSchemas;

/// Kind of catalog record a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Part,
    Rule,
}

impl RecordKind {
    pub fn all() -> &'static [RecordKind] {
        &[RecordKind::Part, RecordKind::Rule]
    }

    /// Schema file name inside the embedded folder
    pub fn schema_file(&self) -> &'static str {
        match self {
            RecordKind::Part => "part.schema.json",
            RecordKind::Rule => "rule.schema.json",
        }
    }

    /// Infer the record kind from the directory a file lives in
    pub fn from_path(path: &Path) -> Option<Self> {
        path.ancestors().skip(1).find_map(|dir| {
            match dir.file_name().and_then(|n| n.to_str()) {
                Some("parts") => Some(RecordKind::Part),
                Some("rules") => Some(RecordKind::Rule),
                _ => None,
            }
        })
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Part => write!(f, "part"),
            RecordKind::Rule => write!(f, "rule"),
        }
    }
}

/// Lookup of schema text by record kind
#[derive(Debug, Default)]
pub struct SchemaRegistry;

impl SchemaRegistry {
    /// Schema source for a record kind
    pub fn get(&self, kind: RecordKind) -> Option<String> {
        EmbeddedSchemas::get(kind.schema_file())
            .and_then(|file| String::from_utf8(file.data.into_owned()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_schema() {
        let registry = SchemaRegistry;
        for kind in RecordKind::all() {
            let schema = registry.get(*kind).unwrap();
            assert!(serde_json::from_str::<serde_json::Value>(&schema).is_ok());
        }
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(
            RecordKind::from_path(Path::new("/p/catalog/parts/FL-50.yaml")),
            Some(RecordKind::Part)
        );
        assert_eq!(
            RecordKind::from_path(Path::new("catalog/rules/nested/R-1.yaml")),
            Some(RecordKind::Rule)
        );
        assert_eq!(RecordKind::from_path(Path::new("notes/x.yaml")), None);
    }
}
