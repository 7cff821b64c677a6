//! Part instance extraction from a parsed exchange file

use glam::DVec3;
use std::collections::HashMap;

use crate::entities::{PartInstance, PartRecord};
use crate::step::parser::{Assembly, PlacementFrame};

/// Euler angles in degrees (x = pitch, y = yaw, z = roll) of a placement frame
///
/// The frame's Z axis gives pitch and yaw, its X axis gives roll. Missing
/// axes default to the global ones.
pub fn frame_rotation(z: Option<DVec3>, x: Option<DVec3>) -> DVec3 {
    let z = z.unwrap_or(DVec3::Z);
    let x = x.unwrap_or(DVec3::X);

    let pitch = z.y.atan2(z.z);
    let yaw = (-z.x).atan2((z.y * z.y + z.z * z.z).sqrt());
    let roll = x.y.atan2(x.x);

    DVec3::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}

/// Ordered part instances of an assembly
///
/// With usage occurrences, one instance per usage is produced from the child
/// product and the usage's own placement. Without them, product *i* is paired
/// with placement frame *i* (both in entity id order); this is a best-effort
/// guess for files that carry no assembly structure.
pub fn extract_instances(assembly: &Assembly) -> Vec<PartInstance> {
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    let mut next_id = |name: &str| {
        let n = occurrences.entry(name.to_string()).or_insert(0);
        *n += 1;
        format!("{}#{}", name, n)
    };

    let mut instances = Vec::new();

    if assembly.usages.is_empty() {
        let mut frames = assembly.placements.values();
        for product in assembly.products.values() {
            let frame = frames.next();
            let id = next_id(&product.name);
            instances.push(instance(id, &product.name, frame));
        }
    } else {
        for usage in &assembly.usages {
            let name = usage
                .child_product
                .and_then(|p| assembly.product_name(p))
                .unwrap_or(usage.occurrence.as_str());
            if name.is_empty() {
                tracing::warn!("usage #{} has no resolvable child product", usage.id);
                continue;
            }
            let frame = usage.placement.and_then(|p| assembly.placements.get(&p));
            let id = next_id(name);
            instances.push(instance(id, name, frame));
        }
    }

    tracing::debug!("extracted {} part instances", instances.len());
    instances
}

fn instance(instance_id: String, name: &str, frame: Option<&PlacementFrame>) -> PartInstance {
    let record = PartRecord::from_product_name(name);
    let mut inst = PartInstance::from_record(&record);
    inst.instance_id = instance_id;

    if let Some(frame) = frame {
        inst.position = frame.origin.unwrap_or(DVec3::ZERO);
        inst.rotation = frame_rotation(frame.z, frame.x);
        inst.z_direction = frame.z;
        inst.x_direction = frame.x;
    }

    inst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PartFamily;
    use crate::step::parser::parse;

    fn approx(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn test_identity_frame_has_zero_rotation() {
        assert!(approx(frame_rotation(None, None), DVec3::ZERO));
        assert!(approx(
            frame_rotation(Some(DVec3::Z), Some(DVec3::X)),
            DVec3::ZERO
        ));
    }

    #[test]
    fn test_frame_rotation_angles() {
        // Z axis along +Y: pitch 90
        let r = frame_rotation(Some(DVec3::Y), Some(DVec3::X));
        assert!(approx(r, DVec3::new(90.0, 0.0, 0.0)));

        // Z axis along -X: yaw 90
        let r = frame_rotation(Some(-DVec3::X), Some(DVec3::Z));
        assert!((r.y - 90.0).abs() < 1e-9);

        // X axis along +Y: roll 90
        let r = frame_rotation(Some(DVec3::Z), Some(DVec3::Y));
        assert!(approx(r, DVec3::new(0.0, 0.0, 90.0)));
    }

    #[test]
    fn test_positional_correspondence() {
        let text = r#"
#1 = PRODUCT('P1','Pipe DN50','',(#9));
#2 = PRODUCT('F1','Flange DN50','',(#9));
#3 = PRODUCT('F2','Flange DN50','',(#9));
#10 = AXIS2_PLACEMENT_3D('',#20,$,$);
#11 = AXIS2_PLACEMENT_3D('',#21,$,$);
#20 = CARTESIAN_POINT('',(0.,0.,0.));
#21 = CARTESIAN_POINT('',(200.,0.,0.));
"#;
        let instances = extract_instances(&parse(text));
        let ids: Vec<_> = instances.iter().map(|i| i.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["Pipe DN50#1", "Flange DN50#1", "Flange DN50#2"]);

        assert_eq!(instances[1].position, DVec3::new(200.0, 0.0, 0.0));
        assert_eq!(instances[1].family, PartFamily::Flange);
        assert_eq!(instances[1].dn, Some(50));
        // No frame left for the third product
        assert_eq!(instances[2].position, DVec3::ZERO);
        assert_eq!(instances[2].rotation, DVec3::ZERO);
    }

    #[test]
    fn test_usage_occurrences_preferred() {
        let text = r#"
#1 = PRODUCT('ASM','Assembly','',(#99));
#2 = PRODUCT('B','Bolt M8x20','',(#99));
#3 = PRODUCT_DEFINITION_FORMATION('','',#1);
#4 = PRODUCT_DEFINITION_FORMATION('','',#2);
#5 = PRODUCT_DEFINITION('','',#3,#98);
#6 = PRODUCT_DEFINITION('','',#4,#98);
#7 = NEXT_ASSEMBLY_USAGE_OCCURRENCE('B-1','','',#5,#6,$);
#8 = NEXT_ASSEMBLY_USAGE_OCCURRENCE('B-2','','',#5,#6,$);
"#;
        let instances = extract_instances(&parse(text));
        let ids: Vec<_> = instances.iter().map(|i| i.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["Bolt M8x20#1", "Bolt M8x20#2"]);
        assert_eq!(instances[0].family, PartFamily::Bolt);
    }
}
