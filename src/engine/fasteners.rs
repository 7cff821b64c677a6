//! Fastener synthesis for bolted connections
//!
//! Flange joints rarely model their bolts and gaskets. For each connected
//! pair with a qualifying constraint this module lays out a bolt circle in
//! the local YZ plane of the target flange and, for sealing interfaces, a
//! gasket on its face.

use glam::DVec3;
use std::collections::HashMap;
use std::f64::consts::TAU;

use crate::core::config::FastenerPolicy;
use crate::entities::{
    rotation_matrix, Constraint, InstanceRole, PartFamily, PartInstance, Placement,
    PlacementSource,
};

/// Instances and placements created for one run
#[derive(Debug, Clone, Default)]
pub struct Synthesis {
    pub instances: Vec<PartInstance>,
    pub placements: Vec<Placement>,
}

impl Synthesis {
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn push(&mut self, instance: PartInstance, placement: Placement) {
        self.instances.push(instance);
        self.placements.push(placement);
    }
}

/// Whether a constraint gets fasteners
///
/// Flange against flange always does; any other pair only when the
/// constraint carries a fastener request.
pub fn needs_fasteners(constraint: &Constraint, a: &PartInstance, b: &PartInstance) -> bool {
    constraint.parameters.fasteners.is_some()
        || (a.family == PartFamily::Flange && b.family == PartFamily::Flange)
}

/// Whether the two families form a sealing interface
pub fn is_sealing_interface(a: PartFamily, b: PartFamily) -> bool {
    let seals = |other: PartFamily| {
        matches!(
            other,
            PartFamily::Flange | PartFamily::Pipe | PartFamily::Valve
        )
    };
    (a == PartFamily::Flange && seals(b)) || (b == PartFamily::Flange && seals(a))
}

/// Bolts and gaskets for every connected pair
///
/// A pair is connected once however many constraints join it. The first
/// constraint carrying a fastener request wins, otherwise the first
/// qualifying one. Constraints whose endpoints are unknown or unplaced are
/// skipped. Output order follows constraint order, bolts before the gasket.
pub fn synthesize(
    instances: &[PartInstance],
    constraints: &[Constraint],
    placements: &[Placement],
    policy: &FastenerPolicy,
) -> Synthesis {
    let by_id: HashMap<&str, &PartInstance> = instances
        .iter()
        .map(|i| (i.instance_id.as_str(), i))
        .collect();
    let placed: HashMap<&str, &Placement> = placements
        .iter()
        .map(|p| (p.instance_id.as_str(), p))
        .collect();

    let qualifying: Vec<_> = constraints
        .iter()
        .filter_map(|c| {
            let a = by_id.get(c.entity_a.as_str())?;
            let b = by_id.get(c.entity_b.as_str())?;
            let face = placed.get(c.entity_b.as_str())?;
            needs_fasteners(c, a, b).then_some((c, *a, *b, *face))
        })
        .collect();

    let mut chosen: HashMap<(&str, &str), &Constraint> = HashMap::new();
    for &(c, ..) in &qualifying {
        chosen
            .entry(pair_key(c))
            .and_modify(|current| {
                if current.parameters.fasteners.is_none() && c.parameters.fasteners.is_some() {
                    *current = c;
                }
            })
            .or_insert(c);
    }

    let mut synthesis = Synthesis::default();

    for (c, a, b, face) in qualifying {
        let winner = chosen.get(&pair_key(c));
        if winner.is_some_and(|w| w.constraint_id == c.constraint_id) {
            connection(&mut synthesis, c, a, b, face, policy);
        } else {
            tracing::debug!(
                "{} joins an already fastened pair {} <-> {}",
                c.constraint_id,
                c.entity_a,
                c.entity_b
            );
        }
    }

    if !synthesis.is_empty() {
        tracing::info!(
            "synthesized {} fastener and seal instance(s)",
            synthesis.instances.len()
        );
    }
    synthesis
}

/// Unordered endpoint pair
fn pair_key(c: &Constraint) -> (&str, &str) {
    let (a, b) = (c.entity_a.as_str(), c.entity_b.as_str());
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn connection(
    out: &mut Synthesis,
    c: &Constraint,
    a: &PartInstance,
    b: &PartInstance,
    face: &Placement,
    policy: &FastenerPolicy,
) {
    let request = c.parameters.fasteners.clone().unwrap_or_default();
    let dn = a.dn.or(b.dn).unwrap_or(policy.default_dn);
    let radius = policy.bolt_circle_factor * f64::from(dn);
    let count = request.bolt_count.unwrap_or(policy.default_bolt_count);
    let bolt_spec = request
        .bolt_spec
        .clone()
        .unwrap_or_else(|| policy.default_bolt_spec.clone());

    let frame = rotation_matrix(face.rotation);
    let source = PlacementSource::Synthesized {
        connection_id: c.constraint_id.clone(),
    };

    for (i, local) in bolt_circle(count, radius, policy.bolt_standoff)
        .into_iter()
        .enumerate()
    {
        let instance_id = format!("{}-BOLT-{}", c.constraint_id, i + 1);
        let position = face.position + frame * local;
        tracing::debug!(
            "bolt {} at ({:.3}, {:.3}, {:.3})",
            instance_id,
            position.x,
            position.y,
            position.z
        );
        let placement = Placement {
            instance_id,
            position,
            rotation: face.rotation,
            source: source.clone(),
        };
        let bolt = synthesized(
            &placement,
            &bolt_spec,
            PartFamily::Bolt,
            InstanceRole::Fastener,
            c,
        );
        out.push(bolt, placement);
    }

    if request.gasket.is_some() || is_sealing_interface(a.family, b.family) {
        let instance_id = format!("{}-GASKET", c.constraint_id);
        let part_id = request
            .gasket
            .clone()
            .unwrap_or_else(|| format!("DN{}-RF", dn));
        let position = face.position + frame * DVec3::new(policy.gasket_offset, 0.0, 0.0);
        let placement = Placement {
            instance_id,
            position,
            rotation: face.rotation,
            source,
        };
        let mut gasket =
            synthesized(&placement, &part_id, PartFamily::Gasket, InstanceRole::Seal, c);
        gasket.dn = Some(dn);
        out.push(gasket, placement);
    }
}

/// Local offsets of `count` bolts: axial standoff along X, circle in YZ
pub fn bolt_circle(count: u32, radius: f64, standoff: f64) -> Vec<DVec3> {
    (0..count)
        .map(|i| {
            let theta = TAU * f64::from(i) / f64::from(count);
            DVec3::new(standoff, radius * theta.cos(), radius * theta.sin())
        })
        .collect()
}

fn synthesized(
    placement: &Placement,
    part_id: &str,
    family: PartFamily,
    role: InstanceRole,
    c: &Constraint,
) -> PartInstance {
    PartInstance {
        instance_id: placement.instance_id.clone(),
        part_id: part_id.to_string(),
        name: part_id.to_string(),
        family,
        dn: None,
        position: placement.position,
        rotation: placement.rotation,
        z_direction: None,
        x_direction: None,
        role: Some(role),
        connection_id: Some(c.constraint_id.clone()),
    }
}
