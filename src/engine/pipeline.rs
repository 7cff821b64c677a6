//! Run orchestration
//!
//! An [`EngineContext`] holds one snapshot of the catalog, the rule library
//! and the numeric policy. Each run reads the snapshot and returns an owned
//! [`AssemblyRun`]; nothing is shared between runs.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::core::store::{CatalogStore, PartFilter};
use crate::core::Policy;
use crate::engine::error::EngineError;
use crate::engine::fasteners::synthesize;
use crate::engine::generator::{generate_catalog, generate_sequential};
use crate::engine::report::{dn_consistency, PlacementReport};
use crate::engine::solver::PlacementSolver;
use crate::engine::warning::Warning;
use crate::entities::{Constraint, ConstraintRule, PartInstance, PartRecord, Placement};
use crate::scene::{export_scene, MeshSource, Scene};
use crate::step;

/// How constraints were generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every catalog pair, best rule per pair
    Catalog,
    /// Adjacent instances of an exchange file
    Exchange,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Catalog => write!(f, "catalog"),
            Mode::Exchange => write!(f, "exchange"),
        }
    }
}

/// Counts describing a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub catalog_parts: usize,
    pub rules: usize,
    pub instances: usize,
    pub synthesized: usize,
    pub constraints: usize,
    pub placed_by_constraint: usize,
    pub fallback: usize,
    pub passes: usize,
    pub warnings: usize,
}

/// Everything one run produced
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyRun {
    pub name: String,
    pub mode: Mode,
    pub instances: Vec<PartInstance>,
    pub constraints: Vec<Constraint>,
    pub placements: Vec<Placement>,
    pub report: PlacementReport,
    pub warnings: Vec<Warning>,
    pub statistics: Statistics,
}

impl AssemblyRun {
    pub fn placement(&self, instance_id: &str) -> Option<&Placement> {
        self.placements.iter().find(|p| p.instance_id == instance_id)
    }

    /// Export the scene, marking every placed instance exported
    ///
    /// Mesh failures are added to the run's warnings.
    pub fn export_scene(&mut self, meshes: Option<&dyn MeshSource>) -> Scene {
        let (scene, warnings) = export_scene(&self.name, &self.instances, &self.placements, meshes);
        self.warnings.extend(warnings);
        self.statistics.warnings = self.warnings.len();
        self.report.mark_exported();
        scene
    }
}

/// Run-scoped snapshot of catalog, rules and policy
#[derive(Debug, Clone)]
pub struct EngineContext {
    parts: Vec<PartRecord>,
    rules: Vec<ConstraintRule>,
    policy: Policy,
    deadline: Option<Instant>,
}

impl EngineContext {
    /// Snapshot the store once
    pub fn load(
        store: &dyn CatalogStore,
        filter: &PartFilter,
        policy: Policy,
    ) -> Result<Self, EngineError> {
        let parts = store.parts(filter)?;
        let rules = store.active_rules()?;
        tracing::info!("loaded {} parts and {} active rules", parts.len(), rules.len());
        Ok(Self::new(parts, rules, policy))
    }

    pub fn new(parts: Vec<PartRecord>, rules: Vec<ConstraintRule>, policy: Policy) -> Self {
        Self {
            parts,
            rules,
            policy,
            deadline: None,
        }
    }

    /// Cancel runs that are still going at `deadline`
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn parts(&self) -> &[PartRecord] {
        &self.parts
    }

    pub fn rules(&self) -> &[ConstraintRule] {
        &self.rules
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Assemble the catalog selection
    pub fn run_catalog(&self) -> Result<AssemblyRun, EngineError> {
        self.catalog_run("catalog".to_string(), Vec::new())
    }

    /// Assemble the parts of a STEP file
    ///
    /// A file without products falls back to the catalog selection.
    pub fn run_exchange(&self, text: &str, name: &str) -> Result<AssemblyRun, EngineError> {
        self.checkpoint("parse")?;
        let assembly = step::parse(text);
        let mut instances = step::extract_instances(&assembly);
        tracing::info!(
            "{}: {} entities, {} products, {} instances",
            name,
            assembly.entity_count,
            assembly.products.len(),
            instances.len()
        );

        if instances.is_empty() {
            if self.parts.is_empty() {
                return Err(EngineError::NoPartData);
            }
            let warning = Warning::EmptyExchangeFile {
                name: name.to_string(),
            };
            tracing::warn!("{}", warning);
            return self.catalog_run(name.to_string(), vec![warning]);
        }

        let catalog: BTreeMap<String, PartRecord> = self
            .parts
            .iter()
            .map(|p| (p.part_id.clone(), p.clone()))
            .collect();
        for inst in &mut instances {
            if let Some(record) = catalog.get(&inst.part_id) {
                inst.family = record.family;
                inst.dn = record.dn.or(inst.dn);
            }
        }

        self.checkpoint("generate")?;
        let constraints =
            generate_sequential(&instances, &catalog, &self.rules, &self.policy.matching);

        self.finish(name.to_string(), Mode::Exchange, instances, constraints, Vec::new())
    }

    fn catalog_run(
        &self,
        name: String,
        warnings: Vec<Warning>,
    ) -> Result<AssemblyRun, EngineError> {
        if self.parts.is_empty() {
            return Err(EngineError::NoPartData);
        }
        self.checkpoint("generate")?;
        let constraints = generate_catalog(&self.parts, &self.rules, &self.policy.matching);
        let instances = self.parts.iter().map(PartInstance::from_record).collect();
        self.finish(name, Mode::Catalog, instances, constraints, warnings)
    }

    fn finish(
        &self,
        name: String,
        mode: Mode,
        mut instances: Vec<PartInstance>,
        constraints: Vec<Constraint>,
        mut warnings: Vec<Warning>,
    ) -> Result<AssemblyRun, EngineError> {
        self.checkpoint("solve")?;
        let outcome = PlacementSolver::new(&instances, &constraints, &self.policy.solver).solve()?;
        warnings.extend(outcome.warnings);
        warnings.extend(dn_consistency(&instances, &constraints));

        self.checkpoint("fasteners")?;
        let mut placements = outcome.placements;
        let synthesis = synthesize(&instances, &constraints, &placements, &self.policy.fasteners);
        let synthesized = synthesis.instances.len();
        instances.extend(synthesis.instances);
        placements.extend(synthesis.placements);

        let report = PlacementReport::build(
            outcome.base,
            outcome.passes,
            &instances,
            &constraints,
            &placements,
        );

        let statistics = Statistics {
            catalog_parts: self.parts.len(),
            rules: self.rules.len(),
            instances: instances.len(),
            synthesized,
            constraints: constraints.len(),
            placed_by_constraint: report
                .entries
                .iter()
                .filter(|e| e.placed_by.is_some() && e.role.is_none())
                .count(),
            fallback: report.fallback_count(),
            passes: report.passes,
            warnings: warnings.len(),
        };

        tracing::info!(
            "{} run '{}': {} instances, {} constraints, {} fallback, {} warning(s)",
            mode,
            name,
            statistics.instances,
            statistics.constraints,
            statistics.fallback,
            statistics.warnings
        );

        Ok(AssemblyRun {
            name,
            mode,
            instances,
            constraints,
            placements,
            report,
            warnings,
            statistics,
        })
    }

    fn checkpoint(&self, stage: &'static str) -> Result<(), EngineError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                tracing::warn!("deadline passed before {}", stage);
                Err(EngineError::Cancelled { stage })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project::{seed_parts, seed_rules};
    use crate::core::FileStore;
    use crate::engine::solver::PlacementState;
    use crate::entities::{ConstraintType, InstanceRole, PartFamily, PlacementSource};
    use glam::DVec3;
    use tempfile::tempdir;

    const BOLT_AND_NUT: &str = "ISO-10303-21;
HEADER;
FILE_NAME('pair.stp','',(''),(''),'','','');
ENDSEC;
DATA;
#1=PRODUCT('B1','Bolt M8x20','',(#9));
#2=PRODUCT('N1','Nut M8','',(#9));
#10=CARTESIAN_POINT('',(0.,0.,0.));
#11=DIRECTION('',(0.,0.,1.));
#12=DIRECTION('',(1.,0.,0.));
#13=AXIS2_PLACEMENT_3D('',#10,#11,#12);
#20=CARTESIAN_POINT('',(0.,0.,25.));
#21=AXIS2_PLACEMENT_3D('',#20,#11,#12);
ENDSEC;
END-ISO-10303-21;
";

    const FLANGE_PAIR: &str = "ISO-10303-21;
DATA;
#1=PRODUCT('F1','Flange DN50','',(#9));
#2=PRODUCT('F2','Flange DN50','',(#9));
#10=CARTESIAN_POINT('',(0.,0.,0.));
#11=DIRECTION('',(0.,0.,1.));
#12=DIRECTION('',(1.,0.,0.));
#13=AXIS2_PLACEMENT_3D('',#10,#11,#12);
#20=CARTESIAN_POINT('',(20.,0.,0.));
#21=AXIS2_PLACEMENT_3D('',#20,#11,#12);
ENDSEC;
END-ISO-10303-21;
";

    fn context() -> EngineContext {
        EngineContext::new(seed_parts(), seed_rules(), Policy::default())
    }

    #[test]
    fn test_catalog_run_places_everything() {
        let run = context().run_catalog().unwrap();
        assert_eq!(run.mode, Mode::Catalog);
        let catalog_ids: Vec<_> = seed_parts().into_iter().map(|p| p.part_id).collect();
        for id in &catalog_ids {
            assert!(run.placement(id).is_some(), "{} not placed", id);
        }
        assert_eq!(run.placements.len(), run.instances.len());
        let base = run.report.base.clone().unwrap();
        let base_placement = run.placement(&base).unwrap();
        assert_eq!(base_placement.position, DVec3::ZERO);
        assert_eq!(base_placement.source, PlacementSource::Base);
        assert!(run.constraints.iter().all(|c| (0.0..=1.0).contains(&c.confidence)));
    }

    #[test]
    fn test_runs_are_deterministic() {
        let a = serde_json::to_string(&context().run_catalog().unwrap()).unwrap();
        let b = serde_json::to_string(&context().run_catalog().unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_catalog_scene_export_is_deterministic() {
        let export = || {
            let mut run = context().run_catalog().unwrap();
            serde_json::to_string(&run.export_scene(None)).unwrap()
        };
        assert_eq!(export(), export());
    }

    #[test]
    fn test_exchange_scene_export_is_deterministic() {
        let export = || {
            let mut run = context().run_exchange(FLANGE_PAIR, "flanges.stp").unwrap();
            assert_eq!(run.mode, Mode::Exchange);
            serde_json::to_string(&run.export_scene(None)).unwrap()
        };
        assert_eq!(export(), export());
    }

    #[test]
    fn test_exchange_flange_pair_fastened_once() {
        let run = context().run_exchange(FLANGE_PAIR, "flanges.stp").unwrap();
        let rules: Vec<_> = run.constraints.iter().map(|c| c.rule_id.as_str()).collect();
        assert_eq!(rules, vec!["R-FLANGE-FLANGE", "R-ADJACENT"]);

        let count = |role| run.instances.iter().filter(|i| i.role == Some(role)).count();
        assert_eq!(count(InstanceRole::Fastener), 4);
        assert_eq!(count(InstanceRole::Seal), 1);
        assert_eq!(run.statistics.synthesized, 5);
    }

    #[test]
    fn test_unconstrained_part_is_reported_as_fallback() {
        let parts = vec![
            PartRecord::new("FL-A", PartFamily::Flange),
            PartRecord::new("FL-B", PartFamily::Flange),
            PartRecord::new("X", PartFamily::Other),
        ];
        let run = EngineContext::new(parts, seed_rules(), Policy::default())
            .run_catalog()
            .unwrap();

        let entry = run.report.entry("X").unwrap();
        assert!(entry.fallback);
        assert!(entry.placed_by.is_none());
        assert!(!run.report.entry("FL-B").unwrap().fallback);
        assert!(matches!(
            run.placement("X").unwrap().source,
            PlacementSource::Fallback { .. }
        ));
    }

    #[test]
    fn test_exchange_run_bolt_and_nut() {
        let run = context().run_exchange(BOLT_AND_NUT, "pair.stp").unwrap();
        assert_eq!(run.mode, Mode::Exchange);
        assert_eq!(run.instances.len(), 2);
        assert_eq!(run.instances[0].instance_id, "Bolt M8x20#1");
        let screws: Vec<_> = run
            .constraints
            .iter()
            .filter(|c| c.constraint_type == ConstraintType::Screw)
            .collect();
        assert_eq!(screws.len(), 1);
        assert_eq!(screws[0].rule_id, "R-BOLT-NUT");
        assert!(screws[0].confidence >= 0.7);
        assert_eq!(run.report.base.as_deref(), Some("Bolt M8x20#1"));
    }

    #[test]
    fn test_catalog_bolt_nut_single_screw() {
        let parts = vec![
            PartRecord::from_product_name("Bolt M8x20"),
            PartRecord::from_product_name("Nut M8"),
        ];
        let run = EngineContext::new(parts, seed_rules(), Policy::default())
            .run_catalog()
            .unwrap();
        assert_eq!(run.constraints.len(), 1);
        assert_eq!(
            run.constraints[0].constraint_type,
            ConstraintType::Screw
        );
        assert!(run.constraints[0].confidence >= 0.7);
    }

    #[test]
    fn test_empty_exchange_falls_back_to_catalog() {
        let run = context().run_exchange("ISO-10303-21;\nDATA;\nENDSEC;\n", "empty.stp").unwrap();
        assert_eq!(run.mode, Mode::Catalog);
        assert_eq!(run.name, "empty.stp");
        assert!(run
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::EmptyExchangeFile { .. })));
    }

    #[test]
    fn test_no_part_data_is_fatal() {
        let ctx = EngineContext::new(Vec::new(), seed_rules(), Policy::default());
        assert!(matches!(ctx.run_catalog(), Err(EngineError::NoPartData)));
        assert!(matches!(
            ctx.run_exchange("", "nothing.stp"),
            Err(EngineError::NoPartData)
        ));
    }

    #[test]
    fn test_expired_deadline_cancels() {
        let ctx = context().with_deadline(Instant::now() - Duration::from_secs(1));
        assert!(matches!(
            ctx.run_catalog(),
            Err(EngineError::Cancelled { stage: "generate" })
        ));
        assert!(matches!(
            ctx.run_exchange(BOLT_AND_NUT, "pair.stp"),
            Err(EngineError::Cancelled { stage: "parse" })
        ));
    }

    #[test]
    fn test_flange_pair_gets_fasteners() {
        let parts = vec![
            PartRecord::new("FL-A", PartFamily::Flange).with_dn(80),
            PartRecord::new("FL-B", PartFamily::Flange).with_dn(80),
        ];
        let run = EngineContext::new(parts, seed_rules(), Policy::default())
            .run_catalog()
            .unwrap();
        assert_eq!(run.statistics.synthesized, 5);
        let bolts = run
            .instances
            .iter()
            .filter(|i| i.role == Some(InstanceRole::Fastener))
            .count();
        assert_eq!(bolts, 4);
        assert!(run.placement("C001-GASKET").is_some());
        assert_eq!(run.report.entries.len(), run.placements.len());
    }

    #[test]
    fn test_export_marks_entries() {
        let mut run = context().run_catalog().unwrap();
        let scene = run.export_scene(None);
        assert_eq!(scene.objects.len(), run.placements.len());
        assert!(run
            .report
            .entries
            .iter()
            .all(|e| e.state == PlacementState::Exported));
    }

    #[test]
    fn test_load_from_store() {
        let tmp = tempdir().unwrap();
        let project = crate::core::Project::init(tmp.path(), false).unwrap();
        let store = FileStore::for_project(&project);
        let ctx = EngineContext::load(&store, &PartFilter::default(), Policy::default()).unwrap();
        assert_eq!(ctx.parts().len(), seed_parts().len());
        assert_eq!(ctx.rules()[0].priority, 10);

        let flanges = PartFilter {
            family: Some(PartFamily::Flange),
            ..Default::default()
        };
        let ctx = EngineContext::load(&store, &flanges, Policy::default()).unwrap();
        assert_eq!(ctx.parts().len(), 1);
    }

    #[test]
    fn test_duplicate_part_file_still_places_everything() {
        let tmp = tempdir().unwrap();
        let project = crate::core::Project::init(tmp.path(), false).unwrap();
        std::fs::write(
            project.parts_dir().join("zz-copy.yaml"),
            "part_id: FL-DN50-PN16\nfamily: flange\ndn: 50\n",
        )
        .unwrap();
        let store = FileStore::for_project(&project);
        let ctx = EngineContext::load(&store, &PartFilter::default(), Policy::default()).unwrap();
        assert_eq!(ctx.parts().len(), seed_parts().len());

        let run = ctx.run_catalog().unwrap();
        assert_eq!(run.placements.len(), run.instances.len());
    }
}
