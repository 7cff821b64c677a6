//! Placement report and post-solve consistency checks

use glam::DVec3;
use serde::Serialize;
use std::collections::HashMap;

use crate::engine::solver::PlacementState;
use crate::engine::warning::Warning;
use crate::entities::{Constraint, InstanceRole, PartInstance, Placement, PlacementSource};

/// One line of the report
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub instance_id: String,
    pub part_id: String,
    pub position: DVec3,
    pub rotation: DVec3,
    /// Constraint that placed the instance, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placed_by: Option<String>,
    /// Every constraint naming the instance
    pub constraints: Vec<String>,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<InstanceRole>,
    pub state: PlacementState,
}

/// How every instance of a run was placed
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlacementReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    pub passes: usize,
    pub entries: Vec<ReportEntry>,
}

impl PlacementReport {
    /// Build from instances and their placements (matched by instance id)
    pub fn build(
        base: Option<String>,
        passes: usize,
        instances: &[PartInstance],
        constraints: &[Constraint],
        placements: &[Placement],
    ) -> Self {
        let placed: HashMap<&str, &Placement> = placements
            .iter()
            .map(|p| (p.instance_id.as_str(), p))
            .collect();

        let entries = instances
            .iter()
            .map(|inst| {
                let placement = placed.get(inst.instance_id.as_str());
                let placed_by = placement.and_then(|p| match &p.source {
                    PlacementSource::Constraint { constraint_id, .. } => {
                        Some(constraint_id.clone())
                    }
                    PlacementSource::Synthesized { connection_id } => Some(connection_id.clone()),
                    _ => None,
                });
                ReportEntry {
                    instance_id: inst.instance_id.clone(),
                    part_id: inst.part_id.clone(),
                    position: placement.map(|p| p.position).unwrap_or(DVec3::ZERO),
                    rotation: placement.map(|p| p.rotation).unwrap_or(DVec3::ZERO),
                    placed_by,
                    constraints: constraints
                        .iter()
                        .filter(|c| c.touches(&inst.instance_id))
                        .map(|c| c.constraint_id.clone())
                        .collect(),
                    fallback: placement.is_some_and(|p| p.is_fallback()),
                    role: inst.role,
                    state: if placement.is_some() {
                        PlacementState::Placed
                    } else {
                        PlacementState::Unplaced
                    },
                }
            })
            .collect();

        Self {
            base,
            passes,
            entries,
        }
    }

    pub fn entry(&self, instance_id: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.instance_id == instance_id)
    }

    pub fn fallback_count(&self) -> usize {
        self.entries.iter().filter(|e| e.fallback).count()
    }

    pub fn mark_exported(&mut self) {
        for entry in &mut self.entries {
            if entry.state == PlacementState::Placed {
                entry.state = PlacementState::Exported;
            }
        }
    }
}

/// Constraints joining two instances with different declared DN
pub fn dn_consistency(instances: &[PartInstance], constraints: &[Constraint]) -> Vec<Warning> {
    let dn_of: HashMap<&str, Option<u32>> = instances
        .iter()
        .map(|i| (i.instance_id.as_str(), i.dn))
        .collect();

    constraints
        .iter()
        .filter_map(|c| {
            let dn_a = (*dn_of.get(c.entity_a.as_str())?)?;
            let dn_b = (*dn_of.get(c.entity_b.as_str())?)?;
            (dn_a != dn_b).then(|| Warning::DnMismatch {
                constraint_id: c.constraint_id.clone(),
                entity_a: c.entity_a.clone(),
                dn_a,
                entity_b: c.entity_b.clone(),
                dn_b,
            })
        })
        .inspect(|w| tracing::warn!("{}", w))
        .collect()
}
