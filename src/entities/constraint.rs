//! Constraint entity - typed relationship between two placed parts

use serde::{Deserialize, Serialize};

/// Constraint type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintType {
    /// Shared axis, offset along it
    Concentric,
    /// Touching faces
    Coincident,
    /// Thread engagement
    Screw,
    /// Fixed separation
    Distance,
    /// Anything the solver has no dedicated handling for
    #[serde(other)]
    Other,
}

impl std::fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintType::Concentric => write!(f, "CONCENTRIC"),
            ConstraintType::Coincident => write!(f, "COINCIDENT"),
            ConstraintType::Screw => write!(f, "SCREW"),
            ConstraintType::Distance => write!(f, "DISTANCE"),
            ConstraintType::Other => write!(f, "OTHER"),
        }
    }
}

/// Fastener request attached to a connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FastenerSpec {
    /// Number of bolts on the bolt circle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bolt_count: Option<u32>,

    /// Bolt part id (e.g. "M16")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bolt_spec: Option<String>,

    /// Gasket part id; presence forces a gasket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gasket: Option<String>,
}

/// Numeric parameters of a constraint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revolutions: Option<f64>,

    /// Rotation about the secondary axis, in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fasteners: Option<FastenerSpec>,
}

impl ConstraintParameters {
    pub fn distance(distance: f64) -> Self {
        Self {
            distance: Some(distance),
            ..Default::default()
        }
    }
}

/// A constraint between two instances, with the rule that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Deterministic identifier (C001, C002, ...)
    pub constraint_id: String,

    /// Source side
    pub entity_a: String,

    /// Target side
    pub entity_b: String,

    pub constraint_type: ConstraintType,

    #[serde(default)]
    pub parameters: ConstraintParameters,

    pub rule_id: String,

    pub rule_name: String,

    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl Constraint {
    /// Identifier for the n-th constraint of a run (0-based)
    pub fn id_for(index: usize) -> String {
        format!("C{:03}", index + 1)
    }

    /// Create a hand-written constraint (no originating rule)
    pub fn manual(
        index: usize,
        entity_a: impl Into<String>,
        entity_b: impl Into<String>,
        constraint_type: ConstraintType,
        parameters: ConstraintParameters,
    ) -> Self {
        Self {
            constraint_id: Self::id_for(index),
            entity_a: entity_a.into(),
            entity_b: entity_b.into(),
            constraint_type,
            parameters,
            rule_id: "manual".to_string(),
            rule_name: "Manual".to_string(),
            confidence: 1.0,
        }
    }

    /// Whether the constraint references the given instance
    pub fn touches(&self, instance_id: &str) -> bool {
        self.entity_a == instance_id || self.entity_b == instance_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_type_wire_names() {
        let json = serde_json::to_string(&ConstraintType::Concentric).unwrap();
        assert_eq!(json, "\"CONCENTRIC\"");
        let parsed: ConstraintType = serde_json::from_str("\"SCREW\"").unwrap();
        assert_eq!(parsed, ConstraintType::Screw);
    }

    #[test]
    fn test_ids_are_sequential() {
        assert_eq!(Constraint::id_for(0), "C001");
        assert_eq!(Constraint::id_for(41), "C042");
    }

    #[test]
    fn test_touches() {
        let c = Constraint::manual(0, "A", "B", ConstraintType::Screw, Default::default());
        assert!(c.touches("A"));
        assert!(c.touches("B"));
        assert!(!c.touches("C"));
    }
}
