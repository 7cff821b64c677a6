//! Scene export for viewers

pub mod color;
pub mod export;
pub mod mesh;

pub use color::{hsl_to_hex, part_color};
pub use export::{export_scene, Geometry, Material, Scene, SceneObject};
pub use mesh::{MeshCache, MeshData, MeshError, MeshSource};
