//! Placements to a renderer-agnostic scene description

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::engine::warning::Warning;
use crate::entities::{InstanceRole, PartFamily, PartInstance, Placement};
use crate::scene::color::part_color;
use crate::scene::mesh::MeshSource;

pub const SCENE_VERSION: &str = "1.0";

/// Complete scene: shared geometries and materials, one object per instance
#[derive(Debug, Clone, Serialize)]
pub struct Scene {
    pub metadata: SceneMetadata,
    pub geometries: Vec<Geometry>,
    pub materials: Vec<Material>,
    pub objects: Vec<SceneObject>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneMetadata {
    pub version: String,
    pub generator: String,
    pub name: String,
    pub object_count: usize,
}

/// Geometry shared by every instance of a part
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    #[serde(rename = "BoxGeometry")]
    Box {
        uuid: String,
        width: f64,
        height: f64,
        depth: f64,
    },
    #[serde(rename = "CylinderGeometry", rename_all = "camelCase")]
    Cylinder {
        uuid: String,
        radius_top: f64,
        radius_bottom: f64,
        height: f64,
        radial_segments: u32,
    },
    #[serde(rename = "BufferGeometry")]
    Mesh {
        uuid: String,
        vertices: Vec<f32>,
        normals: Vec<f32>,
    },
}

impl Geometry {
    pub fn uuid(&self) -> &str {
        match self {
            Geometry::Box { uuid, .. }
            | Geometry::Cylinder { uuid, .. }
            | Geometry::Mesh { uuid, .. } => uuid,
        }
    }

    fn cube(uuid: String, width: f64, height: f64, depth: f64) -> Self {
        Geometry::Box {
            uuid,
            width,
            height,
            depth,
        }
    }

    fn cylinder(uuid: String, radius: f64, height: f64) -> Self {
        Geometry::Cylinder {
            uuid,
            radius_top: radius,
            radius_bottom: radius,
            height,
            radial_segments: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub uuid: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub color: String,
    pub metalness: f64,
    pub roughness: f64,
}

/// One placed instance
#[derive(Debug, Clone, Serialize)]
pub struct SceneObject {
    pub uuid: String,
    pub name: String,
    pub part_id: String,
    pub geometry: String,
    pub material: String,
    /// Column-major 4x4 transform
    pub matrix: [f64; 16],
    pub user_data: ObjectData,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectData {
    pub family: PartFamily,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<InstanceRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

/// Primitive stand-in for a part
pub fn primitive_geometry(uuid: String, instance: &PartInstance) -> Geometry {
    let nominal = f64::from(instance.dn.unwrap_or(50));
    match instance.family {
        PartFamily::Valve => Geometry::cube(uuid, 150.0, 100.0, 100.0),
        PartFamily::Flange => Geometry::cylinder(uuid, nominal, 20.0),
        PartFamily::Pipe => Geometry::cylinder(uuid, 25.0, 100.0),
        PartFamily::Bolt => Geometry::cylinder(uuid, 8.0, 60.0),
        PartFamily::Gasket => Geometry::cylinder(uuid, nominal, 3.0),
        _ => {
            let id = instance.part_id.to_uppercase();
            if id.contains("VALVE") {
                Geometry::cube(uuid, 150.0, 100.0, 100.0)
            } else if id.contains("FLANGE") {
                Geometry::cylinder(uuid, 50.0, 20.0)
            } else if id.contains("PIPE") {
                Geometry::cylinder(uuid, 25.0, 100.0)
            } else {
                Geometry::cube(uuid, 50.0, 50.0, 50.0)
            }
        }
    }
}

/// Build the scene for every placed instance
///
/// Instances without a placement are left out. Mesh failures are returned
/// as warnings, one per part.
pub fn export_scene(
    name: &str,
    instances: &[PartInstance],
    placements: &[Placement],
    meshes: Option<&dyn MeshSource>,
) -> (Scene, Vec<Warning>) {
    let placed: HashMap<&str, &Placement> = placements
        .iter()
        .map(|p| (p.instance_id.as_str(), p))
        .collect();

    let mut geometries: BTreeMap<String, Geometry> = BTreeMap::new();
    let mut materials: BTreeMap<String, Material> = BTreeMap::new();
    let mut objects = Vec::new();
    let mut warnings = Vec::new();

    for instance in instances {
        let Some(placement) = placed.get(instance.instance_id.as_str()) else {
            continue;
        };
        let part_id = &instance.part_id;
        let geometry_id = format!("geo-{}", part_id);
        let material_id = format!("mat-{}", part_id);

        if !geometries.contains_key(part_id) {
            let geometry = match meshes.map(|m| m.mesh(part_id)) {
                Some(Ok(Some(mesh))) => Geometry::Mesh {
                    uuid: geometry_id.clone(),
                    vertices: mesh.vertices,
                    normals: mesh.normals,
                },
                Some(Err(e)) => {
                    let warning = Warning::GeometryUnavailable {
                        part_id: part_id.clone(),
                        reason: e.to_string(),
                    };
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                    primitive_geometry(geometry_id.clone(), instance)
                }
                Some(Ok(None)) | None => primitive_geometry(geometry_id.clone(), instance),
            };
            geometries.insert(part_id.clone(), geometry);
        }

        materials.entry(part_id.clone()).or_insert_with(|| Material {
            uuid: material_id.clone(),
            kind: "MeshStandardMaterial".to_string(),
            color: part_color(part_id),
            metalness: 0.5,
            roughness: 0.5,
        });

        objects.push(SceneObject {
            uuid: format!("obj-{}", instance.instance_id),
            name: instance.instance_id.clone(),
            part_id: part_id.clone(),
            geometry: geometry_id,
            material: material_id,
            matrix: placement.transform().to_cols_array(),
            user_data: ObjectData {
                family: instance.family,
                fallback: placement.is_fallback(),
                role: instance.role,
                connection_id: instance.connection_id.clone(),
            },
        });
    }

    tracing::info!(
        "exported {} objects, {} geometries",
        objects.len(),
        geometries.len()
    );

    let scene = Scene {
        metadata: SceneMetadata {
            version: SCENE_VERSION.to_string(),
            generator: format!("tasm {}", env!("CARGO_PKG_VERSION")),
            name: name.to_string(),
            object_count: objects.len(),
        },
        geometries: geometries.into_values().collect(),
        materials: materials.into_values().collect(),
        objects,
    };
    (scene, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{PartRecord, PlacementSource};
    use crate::scene::mesh::{MeshData, MeshError};
    use glam::DVec3;
    use std::path::PathBuf;

    fn inst(id: &str, family: PartFamily) -> PartInstance {
        PartInstance::from_record(&PartRecord::new(id, family))
    }

    fn at(id: &str, position: DVec3, rotation: DVec3) -> Placement {
        Placement {
            instance_id: id.into(),
            position,
            rotation,
            source: PlacementSource::Base,
        }
    }

    struct Flaky;

    impl MeshSource for Flaky {
        fn mesh(&self, part_id: &str) -> Result<Option<MeshData>, MeshError> {
            match part_id {
                "GOOD" => Ok(Some(MeshData {
                    vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                    normals: vec![],
                })),
                "BROKEN" => Err(MeshError::Malformed {
                    path: PathBuf::from("BROKEN.mesh.json"),
                    reason: "truncated".into(),
                }),
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn test_matrix_is_column_major() {
        let instances = vec![inst("A", PartFamily::Other)];
        let placements = vec![at("A", DVec3::new(10.0, 20.0, 30.0), DVec3::ZERO)];
        let (scene, warnings) = export_scene("t", &instances, &placements, None);
        assert!(warnings.is_empty());
        assert_eq!(
            scene.objects[0].matrix,
            [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 10.0, 20.0, 30.0, 1.0]
        );
    }

    #[test]
    fn test_matrix_rotation_order() {
        let instances = vec![inst("A", PartFamily::Other)];
        let placements = vec![at("A", DVec3::ZERO, DVec3::new(0.0, 0.0, 90.0))];
        let (scene, _) = export_scene("t", &instances, &placements, None);
        let m = scene.objects[0].matrix;
        // first column is the image of +X: (0, 1, 0)
        assert!(m[0].abs() < 1e-12);
        assert!((m[1] - 1.0).abs() < 1e-12);
        assert!(m[2].abs() < 1e-12);
    }

    #[test]
    fn test_primitives_by_family_and_name() {
        let mut flange = inst("FL-80", PartFamily::Flange);
        flange.dn = Some(80);
        assert_eq!(
            primitive_geometry("g".into(), &flange),
            Geometry::cylinder("g".into(), 80.0, 20.0)
        );
        assert_eq!(
            primitive_geometry("g".into(), &inst("X", PartFamily::Valve)),
            Geometry::cube("g".into(), 150.0, 100.0, 100.0)
        );
        assert_eq!(
            primitive_geometry("g".into(), &inst("SPOOL-PIPE-2", PartFamily::Other)),
            Geometry::cylinder("g".into(), 25.0, 100.0)
        );
        assert_eq!(
            primitive_geometry("g".into(), &inst("BRACKET", PartFamily::Other)),
            Geometry::cube("g".into(), 50.0, 50.0, 50.0)
        );
        assert_eq!(
            primitive_geometry("g".into(), &inst("GK", PartFamily::Gasket)),
            Geometry::cylinder("g".into(), 50.0, 3.0)
        );
    }

    #[test]
    fn test_mesh_failures_fall_back_per_part() {
        let instances = vec![
            inst("GOOD", PartFamily::Other),
            inst("BROKEN", PartFamily::Valve),
            inst("PLAIN", PartFamily::Pipe),
        ];
        let placements: Vec<_> = instances
            .iter()
            .map(|i| at(&i.instance_id, DVec3::ZERO, DVec3::ZERO))
            .collect();
        let meshes: &dyn MeshSource = &Flaky;
        let (scene, warnings) = export_scene("t", &instances, &placements, Some(meshes));

        assert_eq!(scene.objects.len(), 3);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            Warning::GeometryUnavailable { part_id, .. } if part_id == "BROKEN"
        ));
        let broken = scene.geometries.iter().find(|g| g.uuid() == "geo-BROKEN").unwrap();
        assert!(matches!(broken, Geometry::Box { .. }));
        let good = scene.geometries.iter().find(|g| g.uuid() == "geo-GOOD").unwrap();
        assert!(matches!(good, Geometry::Mesh { .. }));
    }

    #[test]
    fn test_shared_geometry_and_json_shape() {
        let mut a = inst("FL", PartFamily::Flange);
        a.instance_id = "FL#1".into();
        let mut b = inst("FL", PartFamily::Flange);
        b.instance_id = "FL#2".into();
        let placements = vec![
            at("FL#1", DVec3::ZERO, DVec3::ZERO),
            at("FL#2", DVec3::X * 20.0, DVec3::ZERO),
        ];
        let (scene, _) = export_scene("pair", &[a, b], &placements, None);
        assert_eq!(scene.geometries.len(), 1);
        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.objects.len(), 2);

        let json = serde_json::to_value(&scene).unwrap();
        assert_eq!(json["geometries"][0]["type"], "CylinderGeometry");
        assert_eq!(json["geometries"][0]["radiusTop"], 50.0);
        assert_eq!(json["materials"][0]["type"], "MeshStandardMaterial");
        assert_eq!(json["materials"][0]["metalness"], 0.5);
        assert_eq!(json["objects"][1]["matrix"][12], 20.0);
        assert_eq!(json["metadata"]["object_count"], 2);
    }

    #[test]
    fn test_unplaced_instances_are_skipped() {
        let instances = vec![inst("A", PartFamily::Other), inst("B", PartFamily::Other)];
        let placements = vec![at("A", DVec3::ZERO, DVec3::ZERO)];
        let (scene, _) = export_scene("t", &instances, &placements, None);
        assert_eq!(scene.objects.len(), 1);
    }
}
