//! Constraint rule - declarative pattern that turns a part pair into a constraint

use serde::{Deserialize, Serialize};

use crate::entities::constraint::{ConstraintParameters, ConstraintType};

/// Predicate over a single part attribute
///
/// `value` requires equality, `contains` requires a substring. When both are
/// given, `contains` wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributePredicate {
    /// Attribute name (metadata key or record field)
    pub field: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
}

/// Condition under which a rule applies to a pair of parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Both parts satisfy the same attribute predicate
    Both(AttributePredicate),

    /// Either part's display name contains the value (case-insensitive)
    NameContains { value: String },

    /// Both parts resolve to the same thread descriptor
    ThreadMatch,

    /// A bolt and a nut with the same thread descriptor
    BoltNutPair,

    /// Instances whose positions lie within a distance band
    DistanceRange { min: f64, max: f64 },

    /// Mate learned from a CAD assembly; applies to any adjacent pair
    MateType { mate_type: String },
}

impl Condition {
    /// Whether the condition depends on instance positions
    pub fn is_spatial(&self) -> bool {
        matches!(self, Condition::DistanceRange { .. } | Condition::MateType { .. })
    }

    /// Short label for tables
    pub fn kind(&self) -> &'static str {
        match self {
            Condition::Both(_) => "both",
            Condition::NameContains { .. } => "name_contains",
            Condition::ThreadMatch => "thread_match",
            Condition::BoltNutPair => "bolt_nut_pair",
            Condition::DistanceRange { .. } => "distance_range",
            Condition::MateType { .. } => "mate_type",
        }
    }
}

/// Constraint produced when a rule applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,

    #[serde(default)]
    pub parameters: ConstraintParameters,
}

/// A declarative constraint rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRule {
    /// Unique rule identifier
    pub rule_id: String,

    /// Human readable name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Higher priority rules win ties and earn more confidence
    #[serde(default)]
    pub priority: i32,

    pub condition: Condition,

    pub action: RuleAction,

    /// Added to the base confidence of positional (sequential) matches
    #[serde(default)]
    pub confidence_boost: f64,

    /// Inactive rules are never returned by a store
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ConstraintRule {
    /// Create an active rule with default parameters
    pub fn new(
        rule_id: impl Into<String>,
        name: impl Into<String>,
        priority: i32,
        condition: Condition,
        constraint_type: ConstraintType,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            name: name.into(),
            description: None,
            priority,
            condition,
            action: RuleAction {
                constraint_type,
                parameters: ConstraintParameters::default(),
            },
            confidence_boost: 0.0,
            active: true,
        }
    }

    pub fn with_parameters(mut self, parameters: ConstraintParameters) -> Self {
        self.action.parameters = parameters;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_yaml_shape() {
        let yaml = r#"
rule_id: R-FLANGE
name: Flange to flange
priority: 9
condition:
  type: both
  field: family
  value: flange
action:
  type: CONCENTRIC
  parameters:
    distance: 20
    fasteners:
      bolt_count: 8
"#;
        let rule: ConstraintRule = serde_yml::from_str(yaml).unwrap();
        assert!(rule.active);
        assert_eq!(rule.priority, 9);
        assert_eq!(rule.action.constraint_type, ConstraintType::Concentric);
        assert_eq!(rule.action.parameters.distance, Some(20.0));
        assert_eq!(
            rule.action.parameters.fasteners.as_ref().and_then(|f| f.bolt_count),
            Some(8)
        );
        match rule.condition {
            Condition::Both(ref p) => {
                assert_eq!(p.field, "family");
                assert_eq!(p.value.as_deref(), Some("flange"));
            }
            ref other => panic!("unexpected condition {:?}", other),
        }
    }

    #[test]
    fn test_unit_conditions_deserialize() {
        let c: Condition = serde_yml::from_str("type: bolt_nut_pair").unwrap();
        assert_eq!(c, Condition::BoltNutPair);
        let c: Condition = serde_yml::from_str("type: distance_range\nmin: 0\nmax: 250").unwrap();
        assert!(c.is_spatial());
        assert_eq!(c.kind(), "distance_range");
    }

    #[test]
    fn test_unknown_constraint_type_is_tolerated() {
        let action: RuleAction = serde_yml::from_str("type: PARALLEL").unwrap();
        assert_eq!(action.constraint_type, ConstraintType::Other);
    }
}
