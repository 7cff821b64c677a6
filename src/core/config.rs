//! Configuration management with layered hierarchy
//!
//! Numeric policy (default distances, bolt counts, grid spacing, nominal part
//! lengths) lives in [`Policy`] so the solver and the fastener synthesizer
//! never carry literals of their own.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::Project;
use crate::entities::PartFamily;

/// Which catalog store backs a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// YAML records under `catalog/`
    #[default]
    Files,
    /// SQLite database synced from the YAML records
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "files" => Ok(StoreBackend::Files),
            "sqlite" => Ok(StoreBackend::Sqlite),
            _ => Err(format!("Unknown store backend: {}. Use files or sqlite", s)),
        }
    }
}

/// Nominal size of a part family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartDimensions {
    /// Axial extent
    pub length: f64,
    pub diameter: f64,
}

/// Placement solver constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverPolicy {
    /// CONCENTRIC / COINCIDENT offset when no distance is given
    pub default_distance: f64,
    /// SCREW offset along the primary axis
    pub screw_lateral_offset: f64,
    /// SCREW axial advance per revolution
    pub thread_pitch: f64,
    /// SCREW revolutions when none are given
    pub default_revolutions: f64,
    /// Scan passes allowed per part
    pub passes_per_part: usize,
    /// Fallback grid columns
    pub grid_columns: usize,
    /// Fallback grid spacing
    pub grid_spacing: f64,
    /// Axial extent used for families missing from the dimension table
    pub default_extent: f64,
    /// Nominal dimensions by family
    pub dimensions: BTreeMap<PartFamily, PartDimensions>,
}

impl Default for SolverPolicy {
    fn default() -> Self {
        let dims = |length, diameter| PartDimensions { length, diameter };
        let mut dimensions = BTreeMap::new();
        dimensions.insert(PartFamily::Valve, dims(150.0, 50.0));
        dimensions.insert(PartFamily::Flange, dims(20.0, 150.0));
        dimensions.insert(PartFamily::Pipe, dims(200.0, 50.0));
        dimensions.insert(PartFamily::Bolt, dims(60.0, 16.0));
        dimensions.insert(PartFamily::Nut, dims(10.0, 24.0));
        dimensions.insert(PartFamily::Gasket, dims(3.0, 100.0));

        Self {
            default_distance: 100.0,
            screw_lateral_offset: 50.0,
            thread_pitch: 2.0,
            default_revolutions: 5.0,
            passes_per_part: 2,
            grid_columns: 5,
            grid_spacing: 200.0,
            default_extent: 100.0,
            dimensions,
        }
    }
}

impl SolverPolicy {
    /// Nominal axial extent of a family
    pub fn axial_extent(&self, family: PartFamily) -> f64 {
        self.dimensions
            .get(&family)
            .map(|d| d.length)
            .unwrap_or(self.default_extent)
    }
}

/// Fastener synthesis constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastenerPolicy {
    /// Bolt circle radius as a multiple of the nominal diameter
    pub bolt_circle_factor: f64,
    pub default_bolt_count: u32,
    pub default_bolt_spec: String,
    /// Nominal diameter when neither flange declares one
    pub default_dn: u32,
    /// Axial distance of bolts from the flange face
    pub bolt_standoff: f64,
    /// Axial offset of the gasket from the flange face
    pub gasket_offset: f64,
}

impl Default for FastenerPolicy {
    fn default() -> Self {
        Self {
            bolt_circle_factor: 1.8,
            default_bolt_count: 4,
            default_bolt_spec: "M16".to_string(),
            default_dn: 50,
            bolt_standoff: 5.0,
            gasket_offset: -2.0,
        }
    }
}

/// Matcher constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    pub base_confidence: f64,
    /// Base confidence of adjacent-instance (sequential) matches
    pub sequential_confidence: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            base_confidence: 0.7,
            sequential_confidence: 0.8,
        }
    }
}

/// All numeric policy in one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub solver: SolverPolicy,
    pub fasteners: FastenerPolicy,
    pub matching: MatchPolicy,
}

/// Tool configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog store backend
    pub store: Option<StoreBackend>,

    /// Directory holding `<part_id>.mesh.json` files
    pub mesh_dir: Option<PathBuf>,

    /// Default output format
    pub default_format: Option<String>,

    /// Numeric policy overrides
    pub policy: Option<Policy>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load_for(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/tasm/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read(&global_path) {
                config.merge(global);
            }
        }

        // 3. Project config (.tasm/config.yaml)
        if let Some(project) = project {
            if let Some(project_config) = Self::read(&project.tasm_dir().join("config.yaml")) {
                config.merge(project_config);
            }
        }

        // 4. Environment variables
        if let Ok(store) = std::env::var("TASM_STORE") {
            match store.parse() {
                Ok(backend) => config.store = Some(backend),
                Err(e) => tracing::warn!("ignoring TASM_STORE: {}", e),
            }
        }
        if let Ok(dir) = std::env::var("TASM_MESH_DIR") {
            config.mesh_dir = Some(PathBuf::from(dir));
        }

        config
    }

    fn read(path: &std::path::Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        if is_blank_document(&contents) {
            return Some(Config::default());
        }
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("ignoring malformed config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "tasm")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.store.is_some() {
            self.store = other.store;
        }
        if other.mesh_dir.is_some() {
            self.mesh_dir = other.mesh_dir;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.policy.is_some() {
            self.policy = other.policy;
        }
    }

    pub fn store(&self) -> StoreBackend {
        self.store.unwrap_or_default()
    }

    pub fn policy(&self) -> Policy {
        self.policy.clone().unwrap_or_default()
    }
}

/// Whether a YAML document holds nothing but comments and markers
fn is_blank_document(contents: &str) -> bool {
    contents.lines().map(str::trim).all(|line| {
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_policy_defaults() {
        let policy = Policy::default();
        assert_eq!(policy.solver.default_distance, 100.0);
        assert_eq!(policy.solver.axial_extent(PartFamily::Valve), 150.0);
        assert_eq!(policy.solver.axial_extent(PartFamily::Other), 100.0);
        assert_eq!(policy.fasteners.default_bolt_count, 4);
        assert_eq!(policy.fasteners.bolt_circle_factor, 1.8);
        assert_eq!(policy.matching.base_confidence, 0.7);
    }

    #[test]
    fn test_partial_policy_override_keeps_defaults() {
        let yaml = "policy:\n  solver:\n    grid_spacing: 500\n";
        let config: Config = serde_yml::from_str(yaml).unwrap();
        let policy = config.policy();
        assert_eq!(policy.solver.grid_spacing, 500.0);
        assert_eq!(policy.solver.grid_columns, 5);
        assert_eq!(policy.fasteners.default_bolt_spec, "M16");
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Config {
            store: Some(StoreBackend::Files),
            ..Default::default()
        };
        base.merge(Config {
            store: Some(StoreBackend::Sqlite),
            ..Default::default()
        });
        assert_eq!(base.store(), StoreBackend::Sqlite);
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("SQLite".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_comment_only_config_reads_as_default() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "# store: sqlite\n\n---\n#   mesh_dir: meshes\n").unwrap();

        let config = Config::read(&path).unwrap();
        assert!(config.store.is_none());
        assert!(config.policy.is_none());
    }

    #[test]
    fn test_malformed_config_is_ignored() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "store: [\n").unwrap();
        assert!(Config::read(&path).is_none());
        assert!(Config::read(&tmp.path().join("missing.yaml")).is_none());
    }

    #[test]
    fn test_initialized_project_config_reads_as_default() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path(), false).unwrap();
        let config = Config::read(&project.tasm_dir().join("config.yaml")).unwrap();
        assert!(config.default_format.is_none());
        assert_eq!(config.store(), StoreBackend::Files);
    }
}
