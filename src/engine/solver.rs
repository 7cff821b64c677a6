//! Placement solver
//!
//! Propagates positions from a base instance through the constraint list.
//! Each pass scans every constraint in order; a constraint with exactly one
//! placed endpoint places the other. Passes stop when one makes no progress
//! or after `passes_per_part * instance count` passes, whichever comes first.
//! Instances left over are laid out on a grid and reported.

use glam::DVec3;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::config::SolverPolicy;
use crate::engine::error::EngineError;
use crate::engine::warning::Warning;
use crate::entities::{
    rotation_matrix, Constraint, ConstraintType, PartInstance, Placement, PlacementSource,
};

/// Lifecycle of an instance within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementState {
    Unplaced,
    Placed,
    /// Written to a scene
    Exported,
}

/// Result of solving
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// One placement per instance, in instance order
    pub placements: Vec<Placement>,
    pub base: Option<String>,
    /// Passes actually run
    pub passes: usize,
    pub warnings: Vec<Warning>,
}

/// Solver over one run's instances and constraints
pub struct PlacementSolver<'a> {
    instances: &'a [PartInstance],
    constraints: &'a [Constraint],
    policy: &'a SolverPolicy,
}

impl<'a> PlacementSolver<'a> {
    pub fn new(
        instances: &'a [PartInstance],
        constraints: &'a [Constraint],
        policy: &'a SolverPolicy,
    ) -> Self {
        Self {
            instances,
            constraints,
            policy,
        }
    }

    pub fn solve(&self) -> Result<SolveOutcome, EngineError> {
        let index: HashMap<&str, usize> = self
            .instances
            .iter()
            .enumerate()
            .map(|(i, inst)| (inst.instance_id.as_str(), i))
            .collect();

        let mut warnings = Vec::new();
        let usable = self.usable_constraints(&index, &mut warnings);

        let mut slots: Vec<Option<Placement>> = vec![None; self.instances.len()];
        let base = self.base_index(&usable);

        if let Some(b) = base {
            let inst = &self.instances[b];
            tracing::debug!("base part {} at origin", inst.instance_id);
            slots[b] = Some(Placement {
                instance_id: inst.instance_id.clone(),
                position: DVec3::ZERO,
                rotation: DVec3::ZERO,
                source: PlacementSource::Base,
            });
        }

        let max_passes = self.policy.passes_per_part * self.instances.len();
        let mut passes = 0;
        while passes < max_passes && slots.iter().any(Option::is_none) {
            passes += 1;
            let mut progress = false;

            for (c, ia, ib) in &usable {
                let placed = match (&slots[*ia], &slots[*ib]) {
                    (Some(from), None) => Some((*ib, self.propagate(c, from, *ia, false))),
                    (None, Some(from)) => Some((*ia, self.propagate(c, from, *ia, true))),
                    _ => None,
                };
                if let Some((target, placement)) = placed {
                    tracing::debug!(
                        "placed {} at ({:.3}, {:.3}, {:.3}) via {}",
                        placement.instance_id,
                        placement.position.x,
                        placement.position.y,
                        placement.position.z,
                        c.constraint_id
                    );
                    slots[target] = Some(placement);
                    progress = true;
                }
            }

            if !progress {
                break;
            }
        }

        let mut slot = 0;
        for (i, inst) in self.instances.iter().enumerate() {
            if slots[i].is_some() {
                continue;
            }
            let position = self.grid_position(slot);
            let warning = Warning::FallbackPlacement {
                instance_id: inst.instance_id.clone(),
                slot,
                position,
            };
            tracing::warn!("{}", warning);
            warnings.push(warning);
            slots[i] = Some(Placement {
                instance_id: inst.instance_id.clone(),
                position,
                rotation: DVec3::ZERO,
                source: PlacementSource::Fallback { slot },
            });
            slot += 1;
        }

        let placements: Vec<Placement> = slots.into_iter().flatten().collect();
        validate_completeness(self.instances, &placements)?;

        tracing::info!(
            "solved {} placements in {} pass(es), {} fallback",
            placements.len(),
            passes,
            slot
        );

        Ok(SolveOutcome {
            placements,
            base: base.map(|b| self.instances[b].instance_id.clone()),
            passes,
            warnings,
        })
    }

    /// Constraints whose endpoints both exist, with their instance indices
    ///
    /// Every unknown endpoint is reported once.
    fn usable_constraints(
        &self,
        index: &HashMap<&str, usize>,
        warnings: &mut Vec<Warning>,
    ) -> Vec<(&'a Constraint, usize, usize)> {
        let mut reported: HashSet<(&str, &str)> = HashSet::new();
        let mut usable = Vec::new();

        for c in self.constraints {
            let ia = index.get(c.entity_a.as_str()).copied();
            let ib = index.get(c.entity_b.as_str()).copied();
            match (ia, ib) {
                (Some(ia), Some(ib)) if ia != ib => usable.push((c, ia, ib)),
                (Some(_), Some(_)) => {
                    tracing::debug!("ignoring self constraint {}", c.constraint_id)
                }
                _ => {
                    for (endpoint, found) in [(&c.entity_a, ia), (&c.entity_b, ib)] {
                        if found.is_none()
                            && reported.insert((c.constraint_id.as_str(), endpoint.as_str()))
                        {
                            let warning = Warning::UnknownEndpoint {
                                constraint_id: c.constraint_id.clone(),
                                instance_id: endpoint.clone(),
                            };
                            tracing::warn!("{}", warning);
                            warnings.push(warning);
                        }
                    }
                }
            }
        }

        usable
    }

    /// First instance that is a source and never a target; else the first
    /// that is never a target; else the first instance
    fn base_index(&self, usable: &[(&Constraint, usize, usize)]) -> Option<usize> {
        if self.instances.is_empty() {
            return None;
        }
        let sources: HashSet<usize> = usable.iter().map(|(_, a, _)| *a).collect();
        let targets: HashSet<usize> = usable.iter().map(|(_, _, b)| *b).collect();

        let order = 0..self.instances.len();
        order
            .clone()
            .find(|i| sources.contains(i) && !targets.contains(i))
            .or_else(|| order.clone().find(|i| !targets.contains(i)))
            .or(Some(0))
    }

    /// Place the unknown endpoint of `c` relative to the placed one
    ///
    /// Forward: `from` is entity_a. Backward: `from` is entity_b and the
    /// offset and angle are negated.
    fn propagate(
        &self,
        c: &Constraint,
        from: &Placement,
        a_index: usize,
        backward: bool,
    ) -> Placement {
        let frame = rotation_matrix(from.rotation);
        let primary = frame * DVec3::X;
        let axial = frame * DVec3::Z;

        let family_a = self.instances[a_index].family;
        let params = &c.parameters;

        let offset = match c.constraint_type {
            ConstraintType::Concentric | ConstraintType::Coincident => {
                primary * params.distance.unwrap_or(self.policy.default_distance)
            }
            ConstraintType::Screw => {
                let revolutions = params.revolutions.unwrap_or(self.policy.default_revolutions);
                primary * self.policy.screw_lateral_offset
                    + axial * (revolutions * self.policy.thread_pitch)
            }
            ConstraintType::Distance => {
                primary * params.distance.unwrap_or_else(|| self.policy.axial_extent(family_a))
            }
            ConstraintType::Other => primary * self.policy.axial_extent(family_a),
        };
        let angle = DVec3::new(0.0, params.angle.unwrap_or(0.0), 0.0);

        let (instance_id, position, rotation) = if backward {
            (&c.entity_a, from.position - offset, from.rotation - angle)
        } else {
            (&c.entity_b, from.position + offset, from.rotation + angle)
        };

        Placement {
            instance_id: instance_id.clone(),
            position,
            rotation,
            source: PlacementSource::Constraint {
                constraint_id: c.constraint_id.clone(),
                from: from.instance_id.clone(),
            },
        }
    }

    fn grid_position(&self, slot: usize) -> DVec3 {
        let columns = self.policy.grid_columns.max(1);
        DVec3::new(
            (slot % columns) as f64 * self.policy.grid_spacing,
            (slot / columns) as f64 * self.policy.grid_spacing,
            0.0,
        )
    }
}

/// Exactly one placement per instance
pub fn validate_completeness(
    instances: &[PartInstance],
    placements: &[Placement],
) -> Result<(), EngineError> {
    let mut counts: BTreeMap<&str, usize> = instances
        .iter()
        .map(|i| (i.instance_id.as_str(), 0))
        .collect();
    let mut duplicated = 0;
    for p in placements {
        if let Some(n) = counts.get_mut(p.instance_id.as_str()) {
            *n += 1;
            if *n == 2 {
                duplicated += 1;
            }
        }
    }
    let missing = counts.values().filter(|n| **n == 0).count();

    if missing > 0 || duplicated > 0 {
        return Err(EngineError::PlacementIncomplete {
            missing,
            duplicated,
        });
    }
    Ok(())
}
