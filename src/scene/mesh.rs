//! Mesh sources for part geometry
//!
//! Tessellated meshes come from outside the engine. A [`MeshSource`] either
//! supplies buffers for a part, has none, or fails; the exporter falls back to
//! a primitive in the last two cases.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Flat vertex and normal buffers (xyz triples)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    #[serde(default)]
    pub normals: Vec<f32>,
}

impl MeshData {
    /// Buffers must hold whole triples and normals must match vertices
    pub fn check(&self) -> Result<(), String> {
        if self.vertices.is_empty() {
            return Err("no vertices".to_string());
        }
        if self.vertices.len() % 3 != 0 {
            return Err(format!(
                "vertex buffer length {} is not a multiple of 3",
                self.vertices.len()
            ));
        }
        if !self.normals.is_empty() && self.normals.len() != self.vertices.len() {
            return Err(format!(
                "{} normals for {} vertices",
                self.normals.len() / 3,
                self.vertices.len() / 3
            ));
        }
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }
}

/// Mesh lookup failure
#[derive(Debug, Error, Diagnostic)]
pub enum MeshError {
    #[error("cannot read {path}: {source}")]
    #[diagnostic(code(tasm::mesh::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed mesh {path}: {reason}")]
    #[diagnostic(code(tasm::mesh::malformed))]
    Malformed { path: PathBuf, reason: String },
}

/// Supplier of tessellated geometry per part
pub trait MeshSource {
    /// `Ok(None)` when the source has nothing for the part
    fn mesh(&self, part_id: &str) -> Result<Option<MeshData>, MeshError>;
}

/// Meshes stored as `<part_id>.mesh.json` in one directory
#[derive(Debug, Clone)]
pub struct MeshCache {
    dir: PathBuf,
}

impl MeshCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, part_id: &str) -> PathBuf {
        let safe: String = part_id
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
                _ => c,
            })
            .collect();
        self.dir.join(format!("{}.mesh.json", safe))
    }
}

impl MeshSource for MeshCache {
    fn mesh(&self, part_id: &str) -> Result<Option<MeshData>, MeshError> {
        let path = self.path_for(part_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|source| MeshError::Io {
            path: path.clone(),
            source,
        })?;
        let mesh: MeshData =
            serde_json::from_str(&content).map_err(|e| MeshError::Malformed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        mesh.check()
            .map_err(|reason| MeshError::Malformed { path, reason })?;

        tracing::debug!("mesh for {}: {} vertices", part_id, mesh.vertex_count());
        Ok(Some(mesh))
    }
}
