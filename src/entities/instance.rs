//! Part instances and their resolved placements

use glam::{DMat3, DMat4, DVec3};
use serde::{Deserialize, Serialize};

use crate::entities::part::{PartFamily, PartRecord};

/// Role of an instance that was synthesized rather than extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceRole {
    Fastener,
    Seal,
}

impl std::fmt::Display for InstanceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceRole::Fastener => write!(f, "fastener"),
            InstanceRole::Seal => write!(f, "seal"),
        }
    }
}

/// An occurrence of a catalog part within one assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartInstance {
    /// Unique within a run
    pub instance_id: String,

    /// Catalog part this is an occurrence of
    pub part_id: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub family: PartFamily,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<u32>,

    /// Position as read from the source (origin when unknown)
    #[serde(default)]
    pub position: DVec3,

    /// Euler angles in degrees (x, y, z)
    #[serde(default)]
    pub rotation: DVec3,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_direction: Option<DVec3>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_direction: Option<DVec3>,

    /// Set on synthesized fasteners and seals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<InstanceRole>,

    /// Connection a synthesized instance belongs to (lookup only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

impl PartInstance {
    /// Instance of a catalog record, identified by its part id
    pub fn from_record(record: &PartRecord) -> Self {
        Self {
            instance_id: record.part_id.clone(),
            part_id: record.part_id.clone(),
            name: record.display_name().to_string(),
            family: record.family,
            dn: record.dn,
            position: DVec3::ZERO,
            rotation: DVec3::ZERO,
            z_direction: None,
            x_direction: None,
            role: None,
            connection_id: None,
        }
    }

    /// Whether the instance was created by the fastener synthesizer
    pub fn is_synthesized(&self) -> bool {
        self.role.is_some()
    }
}

/// How a placement was determined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementSource {
    /// Anchor of the assembly
    Base,
    /// Propagated through a constraint from an already placed instance
    Constraint { constraint_id: String, from: String },
    /// No constraint chain reached the instance
    Fallback { slot: usize },
    /// Fastener or seal generated for a connection
    Synthesized { connection_id: String },
}

/// Final pose of one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub instance_id: String,
    pub position: DVec3,
    /// Euler angles in degrees (x, y, z)
    pub rotation: DVec3,
    pub source: PlacementSource,
}

impl Placement {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, PlacementSource::Fallback { .. })
    }

    /// Rigid transform T * Rz * Ry * Rx
    pub fn transform(&self) -> DMat4 {
        DMat4::from_translation(self.position) * DMat4::from_mat3(rotation_matrix(self.rotation))
    }
}

/// Rotation matrix Rz * Ry * Rx of Euler angles given in degrees
pub fn rotation_matrix(degrees: DVec3) -> DMat3 {
    DMat3::from_rotation_z(degrees.z.to_radians())
        * DMat3::from_rotation_y(degrees.y.to_radians())
        * DMat3::from_rotation_x(degrees.x.to_radians())
}
