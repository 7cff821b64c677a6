//! Constraint generation
//!
//! Two modes:
//! - **catalog**: every unordered pair of catalog parts, best rule per pair
//! - **sequential**: adjacent instances of an exchange file, the best
//!   attribute rule plus every applicable spatial rule per pair
//!
//! Constraint ids are assigned in emission order (`C001`, `C002`, ...).

use std::collections::BTreeMap;

use crate::core::config::MatchPolicy;
use crate::engine::matcher::{best_match, match_parts};
use crate::entities::{Condition, Constraint, ConstraintRule, PartInstance, PartRecord};

/// Best-rule constraints between every pair (i < j) of parts
///
/// Endpoints are part ids. Pairs with no applicable rule produce nothing.
pub fn generate_catalog(
    parts: &[PartRecord],
    rules: &[ConstraintRule],
    policy: &MatchPolicy,
) -> Vec<Constraint> {
    let mut constraints = Vec::new();

    for (i, a) in parts.iter().enumerate() {
        for b in &parts[i + 1..] {
            let matches = match_parts(a, b, rules, policy);
            let Some(best) = best_match(&matches) else {
                continue;
            };

            let constraint = Constraint {
                constraint_id: Constraint::id_for(constraints.len()),
                entity_a: a.part_id.clone(),
                entity_b: b.part_id.clone(),
                constraint_type: best.rule.action.constraint_type,
                parameters: best.rule.action.parameters.clone(),
                rule_id: best.rule.rule_id.clone(),
                rule_name: best.rule.name.clone(),
                confidence: best.confidence,
            };
            tracing::debug!(
                "{} {} <-> {}: {} ({}, confidence {:.2})",
                constraint.constraint_id,
                constraint.entity_a,
                constraint.entity_b,
                constraint.constraint_type,
                constraint.rule_name,
                constraint.confidence
            );
            constraints.push(constraint);
        }
    }

    tracing::info!(
        "catalog mode: {} constraints from {} parts",
        constraints.len(),
        parts.len()
    );
    constraints
}

/// Constraints between adjacent instances (i, i + 1)
///
/// Attribute conditions are evaluated against the instance's catalog record
/// (keyed by part id), or a record inferred from the instance name when the
/// catalog has none. Only the best attribute rule is kept per pair, so a bolt
/// and nut matching both the bolt/nut and thread rules get a single SCREW.
/// Spatial rules (`distance_range`, `mate_type`) each emit when they apply.
pub fn generate_sequential(
    instances: &[PartInstance],
    catalog: &BTreeMap<String, PartRecord>,
    rules: &[ConstraintRule],
    policy: &MatchPolicy,
) -> Vec<Constraint> {
    let record_of = |inst: &PartInstance| {
        catalog
            .get(&inst.part_id)
            .cloned()
            .unwrap_or_else(|| PartRecord::from_product_name(&inst.name))
    };

    let mut constraints = Vec::new();

    for pair in instances.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let (record_a, record_b) = (record_of(a), record_of(b));

        let matches = match_parts(&record_a, &record_b, rules, policy);
        let attribute_rule = best_match(&matches).map(|m| m.rule);
        let spatial_rules = rules.iter().filter(|rule| match &rule.condition {
            Condition::DistanceRange { min, max } => {
                let d = a.position.distance(b.position);
                d >= *min && d <= *max
            }
            Condition::MateType { .. } => true,
            _ => false,
        });

        for rule in attribute_rule.into_iter().chain(spatial_rules) {
            let constraint = Constraint {
                constraint_id: Constraint::id_for(constraints.len()),
                entity_a: a.instance_id.clone(),
                entity_b: b.instance_id.clone(),
                constraint_type: rule.action.constraint_type,
                parameters: rule.action.parameters.clone(),
                rule_id: rule.rule_id.clone(),
                rule_name: rule.name.clone(),
                confidence: sequential_confidence(rule, policy),
            };
            tracing::debug!(
                "{} {} -> {}: {} ({})",
                constraint.constraint_id,
                constraint.entity_a,
                constraint.entity_b,
                constraint.constraint_type,
                constraint.rule_name
            );
            constraints.push(constraint);
        }
    }

    tracing::info!(
        "sequential mode: {} constraints from {} instances",
        constraints.len(),
        instances.len()
    );
    constraints
}

fn sequential_confidence(rule: &ConstraintRule, policy: &MatchPolicy) -> f64 {
    (policy.sequential_confidence + rule.confidence_boost).clamp(0.0, 1.0)
}
