//! Non-fatal conditions collected during a run

use glam::DVec3;
use serde::Serialize;

/// A degraded but recoverable condition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The exchange file declared no products; the catalog was used instead
    EmptyExchangeFile { name: String },

    /// A constraint names an instance that does not exist
    UnknownEndpoint {
        constraint_id: String,
        instance_id: String,
    },

    /// No constraint chain reached the instance
    FallbackPlacement {
        instance_id: String,
        slot: usize,
        position: DVec3,
    },

    /// The mesh source failed; a primitive was used
    GeometryUnavailable { part_id: String, reason: String },

    /// Both endpoints declare a nominal diameter and they differ
    DnMismatch {
        constraint_id: String,
        entity_a: String,
        dn_a: u32,
        entity_b: String,
        dn_b: u32,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::EmptyExchangeFile { name } => {
                write!(f, "{} declares no products; using the catalog selection", name)
            }
            Warning::UnknownEndpoint {
                constraint_id,
                instance_id,
            } => write!(
                f,
                "constraint {} references unknown instance {}",
                constraint_id, instance_id
            ),
            Warning::FallbackPlacement {
                instance_id,
                slot,
                position,
            } => write!(
                f,
                "{} is not reachable through constraints; placed in grid slot {} at ({}, {}, {})",
                instance_id, slot, position.x, position.y, position.z
            ),
            Warning::GeometryUnavailable { part_id, reason } => {
                write!(f, "no mesh for {} ({}); using a primitive", part_id, reason)
            }
            Warning::DnMismatch {
                constraint_id,
                entity_a,
                dn_a,
                entity_b,
                dn_b,
            } => write!(
                f,
                "constraint {} joins {} (DN{}) to {} (DN{})",
                constraint_id, entity_a, dn_a, entity_b, dn_b
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_tag() {
        let w = Warning::FallbackPlacement {
            instance_id: "X".into(),
            slot: 6,
            position: DVec3::new(200.0, 200.0, 0.0),
        };
        assert_eq!(
            w.to_string(),
            "X is not reachable through constraints; placed in grid slot 6 at (200, 200, 0)"
        );
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "fallback_placement");
    }
}
