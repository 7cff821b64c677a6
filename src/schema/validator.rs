//! Schema validation with detailed error reporting

use jsonschema::error::ValidationErrorKind;
use jsonschema::{validator_for, ValidationError as JsonSchemaError, Validator as JsonValidator};
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::schema::registry::{RecordKind, SchemaRegistry};

/// Validation error with source location information
#[derive(Debug, Error, Diagnostic)]
#[error("Schema validation failed: {summary}")]
#[diagnostic(code(tasm::schema::validation_error))]
pub struct ValidationError {
    summary: String,

    #[source_code]
    src: NamedSource<String>,

    #[related]
    violations: Vec<SchemaViolation>,
}

/// A single schema violation
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SchemaViolation {
    #[label("{}", self.hint)]
    span: SourceSpan,

    message: String,
    hint: String,

    #[help]
    help: Option<String>,
}

impl SchemaViolation {
    pub fn new(message: String, hint: String, span: SourceSpan, help: Option<String>) -> Self {
        Self {
            span,
            message,
            hint,
            help,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ValidationError {
    pub fn new(filename: &str, source: &str, violations: Vec<SchemaViolation>) -> Self {
        let count = violations.len();
        let summary = if count == 1 {
            "1 error".to_string()
        } else {
            format!("{} errors", count)
        };
        Self {
            summary,
            src: NamedSource::new(filename, source.to_string()),
            violations,
        }
    }

    /// Get the number of violations
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }
}

/// Schema validator with compiled schemas
pub struct Validator {
    compiled: HashMap<RecordKind, JsonValidator>,
}

impl Validator {
    /// Create a new validator with schemas from the registry
    pub fn new(registry: &SchemaRegistry) -> Self {
        let mut compiled = HashMap::new();

        for kind in RecordKind::all() {
            let Some(schema_str) = registry.get(*kind) else {
                continue;
            };
            match serde_json::from_str::<JsonValue>(&schema_str)
                .map_err(|e| e.to_string())
                .and_then(|json| validator_for(&json).map_err(|e| e.to_string()))
            {
                Ok(validator) => {
                    compiled.insert(*kind, validator);
                }
                Err(e) => tracing::warn!("embedded {} schema is unusable: {}", kind, e),
            }
        }

        Self { compiled }
    }

    /// Validate YAML content, collecting every violation
    pub fn validate(
        &self,
        content: &str,
        filename: &str,
        kind: RecordKind,
    ) -> Result<(), ValidationError> {
        let yaml_value: serde_yml::Value = match serde_yml::from_str(content) {
            Ok(v) => v,
            Err(e) => {
                let span = find_error_span(content, e.location());
                let violation = SchemaViolation::new(
                    format!("YAML parse error: {}", e),
                    "invalid YAML".to_string(),
                    span,
                    Some("Check YAML syntax - proper indentation, colons, quotes".to_string()),
                );
                return Err(ValidationError::new(filename, content, vec![violation]));
            }
        };

        let json_value: JsonValue = match serde_json::to_value(&yaml_value) {
            Ok(v) => v,
            Err(e) => {
                let violation = SchemaViolation::new(
                    format!("Failed to convert YAML to JSON: {}", e),
                    "conversion error".to_string(),
                    (0, content.len()).into(),
                    None,
                );
                return Err(ValidationError::new(filename, content, vec![violation]));
            }
        };

        let Some(schema) = self.compiled.get(&kind) else {
            return Ok(());
        };

        let violations: Vec<SchemaViolation> = schema
            .iter_errors(&json_value)
            .map(|e| error_to_violation(content, &e))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(filename, content, violations))
        }
    }

    /// Validate a file, inferring its record kind from its directory
    ///
    /// Returns `Ok(None)` for files that are not catalog records.
    pub fn validate_file(
        &self,
        path: &Path,
    ) -> std::io::Result<Option<Result<(), ValidationError>>> {
        let Some(kind) = RecordKind::from_path(path) else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(path)?;
        let filename = path.file_name().unwrap_or_default().to_string_lossy();
        Ok(Some(self.validate(&content, &filename, kind)))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&SchemaRegistry)
    }
}

/// Convert a JSON Schema validation error to our violation format
fn error_to_violation(content: &str, error: &JsonSchemaError) -> SchemaViolation {
    let path = error.instance_path.to_string();
    let span = find_path_span(content, &path);
    SchemaViolation::new(
        format_schema_error(error),
        format_error_hint(error),
        span,
        generate_help_message(error),
    )
}

fn format_schema_error(error: &JsonSchemaError) -> String {
    let path = if error.instance_path.as_str().is_empty() {
        "document root".to_string()
    } else {
        format!("'{}'", error.instance_path)
    };

    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let prop = property
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| property.to_string());
            format!("Missing required field: {} at {}", prop, path)
        }
        ValidationErrorKind::Type { kind } => {
            format!("Wrong type at {}: expected {:?}", path, kind)
        }
        ValidationErrorKind::Enum { options } => {
            format!(
                "Invalid value at {}: must be one of: {}",
                path,
                format_enum_options(options)
            )
        }
        ValidationErrorKind::Minimum { limit } => {
            format!("Value at {} is too small: minimum {}", path, limit)
        }
        ValidationErrorKind::Maximum { limit } => {
            format!("Value at {} is too large: maximum {}", path, limit)
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            format!("Unknown field(s) at {}: {}", path, unexpected.join(", "))
        }
        _ => format!("Validation error at {}: {}", path, error),
    }
}

fn format_enum_options(options: &JsonValue) -> String {
    if let Some(arr) = options.as_array() {
        arr.iter()
            .map(|v| v.as_str().map(|s| s.to_string()).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        options.to_string()
    }
}

fn format_error_hint(error: &JsonSchemaError) -> String {
    match &error.kind {
        ValidationErrorKind::Required { .. } => "required field missing",
        ValidationErrorKind::Type { .. } => "wrong type",
        ValidationErrorKind::Enum { .. } => "invalid value",
        ValidationErrorKind::Minimum { .. } | ValidationErrorKind::Maximum { .. } => {
            "out of range"
        }
        ValidationErrorKind::AdditionalProperties { .. } => "unknown field",
        _ => "validation error",
    }
    .to_string()
}

fn generate_help_message(error: &JsonSchemaError) -> Option<String> {
    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let prop = property
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| property.to_string());
            Some(format!("Add the '{}' field to your file", prop))
        }
        ValidationErrorKind::Enum { options } => {
            Some(format!("Valid values: {}", format_enum_options(options)))
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            if unexpected.len() == 1 {
                Some(format!("Remove the '{}' field or check spelling", unexpected[0]))
            } else {
                Some("Remove unknown fields or check spelling".to_string())
            }
        }
        _ => None,
    }
}

/// Find the span (byte offset, length) for a YAML parse error location
fn find_error_span(content: &str, location: Option<serde_yml::Location>) -> SourceSpan {
    let Some(loc) = location else {
        return first_line_span(content);
    };

    let line = loc.line().saturating_sub(1);
    let column = loc.column().saturating_sub(1);

    let mut offset = 0;
    for (i, line_content) in content.lines().enumerate() {
        if i == line {
            offset += column;
            break;
        }
        offset += line_content.len() + 1;
    }

    let rest = &content[offset.min(content.len())..];
    let len = rest.find('\n').unwrap_or(rest.len()).max(1);
    (offset.min(content.len()), len).into()
}

/// Find the span for a JSON pointer in YAML content
fn find_path_span(content: &str, json_path: &str) -> SourceSpan {
    let parts: Vec<&str> = json_path.split('/').filter(|s| !s.is_empty()).collect();

    let Some(last) = parts.last() else {
        return first_line_span(content);
    };

    // Array index: point at the parent key
    if last.parse::<usize>().is_ok() && parts.len() >= 2 {
        if let Some(span) = find_key_span(content, parts[parts.len() - 2]) {
            return span;
        }
    }

    find_key_span(content, last).unwrap_or_else(|| first_line_span(content))
}

fn find_key_span(content: &str, key: &str) -> Option<SourceSpan> {
    let pattern = format!("{}:", key);

    let mut offset = 0;
    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with(&pattern) {
            let indent = line.len() - trimmed.len();
            return Some((offset + indent, trimmed.len()).into());
        }
        offset += line.len() + 1;
    }
    None
}

fn first_line_span(content: &str) -> SourceSpan {
    let len = content.find('\n').unwrap_or(content.len()).max(1);
    (0, len).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validator_compiles_all_schemas() {
        let validator = Validator::default();
        assert!(validator.compiled.contains_key(&RecordKind::Part));
        assert!(validator.compiled.contains_key(&RecordKind::Rule));
    }

    #[test]
    fn test_valid_part() {
        let yaml = r#"
part_id: FL-DN50-PN16
name: Weld neck flange
family: flange
dn: 50
pn: 16
metadata:
  material: A105
"#;
        let result = Validator::default().validate(yaml, "FL-DN50-PN16.yaml", RecordKind::Part);
        assert!(result.is_ok(), "valid part should pass: {:?}", result);
    }

    #[test]
    fn test_invalid_family_enum() {
        let yaml = "part_id: X\nfamily: sprocket\n";
        let err = Validator::default()
            .validate(yaml, "X.yaml", RecordKind::Part)
            .unwrap_err();
        assert_eq!(err.violation_count(), 1);
        assert!(err.violations()[0].message().contains("must be one of"));
    }

    #[test]
    fn test_rule_missing_action() {
        let yaml = "rule_id: R-1\nname: test\ncondition:\n  type: thread_match\n";
        let err = Validator::default()
            .validate(yaml, "R-1.yaml", RecordKind::Rule)
            .unwrap_err();
        assert!(err.violations()[0].message().contains("action"));
    }

    #[test]
    fn test_yaml_syntax_error_is_reported() {
        let yaml = "part_id: [unclosed\n";
        let err = Validator::default()
            .validate(yaml, "bad.yaml", RecordKind::Part)
            .unwrap_err();
        assert!(err.violations()[0].message().starts_with("YAML parse error"));
    }

    #[test]
    fn test_seed_records_validate() {
        let validator = Validator::default();
        for rule in crate::core::project::seed_rules() {
            let yaml = serde_yml::to_string(&rule).unwrap();
            assert!(
                validator.validate(&yaml, "seed.yaml", RecordKind::Rule).is_ok(),
                "seed rule {} should validate",
                rule.rule_id
            );
        }
        for part in crate::core::project::seed_parts() {
            let yaml = serde_yml::to_string(&part).unwrap();
            assert!(validator.validate(&yaml, "seed.yaml", RecordKind::Part).is_ok());
        }
    }
}
