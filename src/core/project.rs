//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::entities::{
    AttributePredicate, Condition, ConstraintParameters, ConstraintRule, ConstraintType,
    FastenerSpec, PartFamily, PartRecord,
};

/// Represents a tasm project
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of .tasm/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(".tasm").is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project structure at the given path
    ///
    /// With `force`, an existing `.tasm/` is reused and the config and seed
    /// files are rewritten.
    pub fn init(path: &Path, force: bool) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let tasm_dir = root.join(".tasm");
        if tasm_dir.exists() && !force {
            return Err(ProjectError::AlreadyExists(root.clone()));
        }

        std::fs::create_dir_all(&tasm_dir).map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(tasm_dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        let project = Self { root };
        project.create_catalog_dirs()?;
        project.write_seed_catalog()?;

        Ok(project)
    }

    fn default_config() -> &'static str {
        r#"# tasm project configuration

# Catalog store backend (files, sqlite)
# store: files

# Directory holding <part_id>.mesh.json geometry files
# mesh_dir: meshes

# Default output format (auto, json, yaml, tsv, md)
# default_format: auto

# Numeric policy overrides; unset values keep their defaults
# policy:
#   solver:
#     default_distance: 100
#     grid_spacing: 200
#   fasteners:
#     default_bolt_count: 4
#     default_bolt_spec: M16
"#
    }

    fn create_catalog_dirs(&self) -> Result<(), ProjectError> {
        for dir in [self.parts_dir(), self.rules_dir()] {
            std::fs::create_dir_all(dir).map_err(|e| ProjectError::IoError(e.to_string()))?;
        }
        Ok(())
    }

    fn write_seed_catalog(&self) -> Result<(), ProjectError> {
        for rule in seed_rules() {
            let path = self.rules_dir().join(format!("{}.yaml", rule.rule_id));
            write_yaml(&path, &rule)?;
        }
        for part in seed_parts() {
            write_yaml(&self.part_path(&part.part_id), &part)?;
        }
        Ok(())
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .tasm configuration directory
    pub fn tasm_dir(&self) -> PathBuf {
        self.root.join(".tasm")
    }

    /// Directory of part records
    pub fn parts_dir(&self) -> PathBuf {
        self.root.join("catalog/parts")
    }

    /// Directory of rule records
    pub fn rules_dir(&self) -> PathBuf {
        self.root.join("catalog/rules")
    }

    /// Location of the SQLite catalog
    pub fn database_path(&self) -> PathBuf {
        self.tasm_dir().join("catalog.db")
    }

    /// Path of the YAML file for a part id
    pub fn part_path(&self, part_id: &str) -> PathBuf {
        self.parts_dir().join(format!("{}.yaml", file_stem_for(part_id)))
    }
}

/// Part ids may contain characters that are awkward in file names
fn file_stem_for(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            c => c,
        })
        .collect()
}

fn write_yaml<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ProjectError> {
    let yaml = serde_yml::to_string(value).map_err(|e| ProjectError::IoError(e.to_string()))?;
    std::fs::write(path, yaml).map_err(|e| ProjectError::IoError(e.to_string()))
}

/// Rules written by `tasm init`
pub fn seed_rules() -> Vec<ConstraintRule> {
    let mut bolt_nut = ConstraintRule::new(
        "R-BOLT-NUT",
        "Bolt and nut thread engagement",
        10,
        Condition::BoltNutPair,
        ConstraintType::Screw,
    )
    .with_parameters(ConstraintParameters {
        revolutions: Some(8.0),
        ..Default::default()
    });
    bolt_nut.description = Some("A bolt and a nut with the same thread size".to_string());

    let flange_pair = ConstraintRule::new(
        "R-FLANGE-FLANGE",
        "Flange face to face",
        9,
        Condition::Both(AttributePredicate {
            field: "family".to_string(),
            value: Some("flange".to_string()),
            contains: None,
        }),
        ConstraintType::Concentric,
    )
    .with_parameters(ConstraintParameters {
        distance: Some(20.0),
        fasteners: Some(FastenerSpec {
            bolt_count: Some(4),
            ..Default::default()
        }),
        ..Default::default()
    });

    let thread = ConstraintRule::new(
        "R-THREAD",
        "Compatible threads",
        9,
        Condition::ThreadMatch,
        ConstraintType::Screw,
    )
    .with_parameters(ConstraintParameters {
        revolutions: Some(5.0),
        ..Default::default()
    });

    let valve = ConstraintRule::new(
        "R-VALVE",
        "Valve inline",
        8,
        Condition::NameContains {
            value: "valve".to_string(),
        },
        ConstraintType::Concentric,
    )
    .with_parameters(ConstraintParameters::distance(150.0));

    let pipe = ConstraintRule::new(
        "R-PIPE",
        "Pipe run",
        5,
        Condition::NameContains {
            value: "pipe".to_string(),
        },
        ConstraintType::Concentric,
    );

    let mut adjacent = ConstraintRule::new(
        "R-ADJACENT",
        "Adjacent parts",
        1,
        Condition::DistanceRange { min: 0.0, max: 500.0 },
        ConstraintType::Coincident,
    );
    adjacent.description = Some("Neighbouring instances of an exchange file".to_string());

    vec![bolt_nut, flange_pair, thread, valve, pipe, adjacent]
}

/// Parts written by `tasm init`
pub fn seed_parts() -> Vec<PartRecord> {
    vec![
        PartRecord::new("FL-DN50-PN16", PartFamily::Flange)
            .with_name("Weld neck flange DN50 PN16")
            .with_dn(50)
            .with_pn(16),
        PartRecord::new("VALVE-DN50", PartFamily::Valve)
            .with_name("Gate valve DN50")
            .with_dn(50)
            .with_pn(16),
        PartRecord::new("PIPE-DN50", PartFamily::Pipe)
            .with_name("Pipe DN50")
            .with_dn(50),
        PartRecord::new("M16", PartFamily::Bolt)
            .with_name("Hex bolt M16x60")
            .with_meta("thread", "M16"),
        PartRecord::new("NUT-M16", PartFamily::Nut)
            .with_name("Hex nut M16")
            .with_meta("thread", "M16"),
    ]
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a tasm project (searched from {searched_from:?}). Run 'tasm init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("tasm project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}
