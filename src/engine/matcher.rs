//! Rule matching over pairs of catalog parts
//!
//! Matching is pure: the same two records and rule list always give the same
//! matches in the same order. A condition either holds or the rule does not
//! apply; there are no partial scores.

use crate::core::config::MatchPolicy;
use crate::entities::{AttributePredicate, Condition, ConstraintRule, PartFamily, PartRecord};

/// A rule that applies to a part pair
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch<'r> {
    pub rule: &'r ConstraintRule,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

/// All rules whose condition holds for the pair, in rule order
pub fn match_parts<'r>(
    a: &PartRecord,
    b: &PartRecord,
    rules: &'r [ConstraintRule],
    policy: &MatchPolicy,
) -> Vec<RuleMatch<'r>> {
    rules
        .iter()
        .filter(|rule| condition_holds(&rule.condition, a, b))
        .map(|rule| RuleMatch {
            rule,
            confidence: confidence(rule, a, b, policy),
        })
        .collect()
}

/// Highest-confidence match; on equal confidence the earlier rule is kept
pub fn best_match<'r>(matches: &[RuleMatch<'r>]) -> Option<RuleMatch<'r>> {
    let mut best: Option<&RuleMatch<'r>> = None;
    for m in matches {
        match best {
            Some(current) if m.confidence <= current.confidence => {}
            _ => best = Some(m),
        }
    }
    best.cloned()
}

/// Base confidence plus priority and dn/pn agreement bonuses, capped at 1
///
/// The dn and pn bonuses require both parts to declare the value.
pub fn confidence(
    rule: &ConstraintRule,
    a: &PartRecord,
    b: &PartRecord,
    policy: &MatchPolicy,
) -> f64 {
    let mut confidence = policy.base_confidence;

    if rule.priority >= 10 {
        confidence += 0.2;
    } else if rule.priority >= 9 {
        confidence += 0.1;
    }

    if a.dn.is_some() && a.dn == b.dn {
        confidence += 0.05;
    }
    if a.pn.is_some() && a.pn == b.pn {
        confidence += 0.05;
    }

    confidence.clamp(0.0, 1.0)
}

/// Whether a non-spatial condition holds for two records
///
/// Spatial conditions (`distance_range`, `mate_type`) need instance
/// positions and never hold here.
pub fn condition_holds(condition: &Condition, a: &PartRecord, b: &PartRecord) -> bool {
    match condition {
        Condition::Both(predicate) => {
            predicate_holds(predicate, a) && predicate_holds(predicate, b)
        }
        Condition::NameContains { value } => {
            let needle = value.to_lowercase();
            [a, b].iter().any(|p| {
                p.display_name().to_lowercase().contains(&needle)
                    || p.part_id.to_lowercase().contains(&needle)
            })
        }
        Condition::ThreadMatch => match (a.thread_descriptor(), b.thread_descriptor()) {
            (Some(ta), Some(tb)) => ta == tb,
            _ => false,
        },
        Condition::BoltNutPair => {
            let pair = matches!(
                (a.family, b.family),
                (PartFamily::Bolt, PartFamily::Nut) | (PartFamily::Nut, PartFamily::Bolt)
            );
            pair && condition_holds(&Condition::ThreadMatch, a, b)
        }
        Condition::DistanceRange { .. } | Condition::MateType { .. } => false,
    }
}

fn predicate_holds(predicate: &AttributePredicate, part: &PartRecord) -> bool {
    let Some(actual) = part.attribute(&predicate.field) else {
        return false;
    };

    if let Some(ref needle) = predicate.contains {
        actual.to_lowercase().contains(&needle.to_lowercase())
    } else if let Some(ref expected) = predicate.value {
        actual.eq_ignore_ascii_case(expected)
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project::seed_rules;
    use crate::entities::ConstraintType;

    fn flange(id: &str, dn: u32, pn: u32) -> PartRecord {
        PartRecord::new(id, PartFamily::Flange).with_dn(dn).with_pn(pn)
    }

    fn family_rule(id: &str, priority: i32, family: &str) -> ConstraintRule {
        ConstraintRule::new(
            id,
            id,
            priority,
            Condition::Both(AttributePredicate {
                field: "family".into(),
                value: Some(family.into()),
                contains: None,
            }),
            ConstraintType::Concentric,
        )
    }

    #[test]
    fn test_both_requires_each_part() {
        let rules = vec![family_rule("R-F", 5, "flange")];
        let a = flange("F1", 50, 16);
        let pipe = PartRecord::new("P1", PartFamily::Pipe);
        assert_eq!(match_parts(&a, &a.clone(), &rules, &MatchPolicy::default()).len(), 1);
        assert!(match_parts(&a, &pipe, &rules, &MatchPolicy::default()).is_empty());
    }

    #[test]
    fn test_confidence_bonuses() {
        let policy = MatchPolicy::default();
        let rule = family_rule("R", 10, "flange");
        let same = confidence(&rule, &flange("A", 50, 16), &flange("B", 50, 16), &policy);
        assert!((same - 1.0).abs() < 1e-12);

        let rule9 = family_rule("R", 9, "flange");
        let c = confidence(&rule9, &flange("A", 50, 16), &flange("B", 80, 40), &policy);
        assert!((c - 0.8).abs() < 1e-12);

        // Missing dn on both sides earns nothing
        let bare = PartRecord::new("X", PartFamily::Flange);
        let c = confidence(&family_rule("R", 1, "flange"), &bare, &bare, &policy);
        assert!((c - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_always_in_unit_interval() {
        let policy = MatchPolicy {
            base_confidence: 0.95,
            ..Default::default()
        };
        for priority in [-5, 0, 9, 10, 50] {
            let c = confidence(
                &family_rule("R", priority, "flange"),
                &flange("A", 50, 16),
                &flange("B", 50, 16),
                &policy,
            );
            assert!((0.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn test_bolt_and_nut_from_names() {
        let bolt = PartRecord::from_product_name("Bolt M8x20");
        let nut = PartRecord::from_product_name("Nut M8");
        let rules = seed_rules();
        let matches = match_parts(&bolt, &nut, &rules, &MatchPolicy::default());

        let best = best_match(&matches).unwrap();
        assert_eq!(best.rule.action.constraint_type, ConstraintType::Screw);
        assert_eq!(best.rule.rule_id, "R-BOLT-NUT");
        assert!(best.confidence >= 0.7);
    }

    #[test]
    fn test_bolt_nut_requires_same_thread() {
        let bolt = PartRecord::from_product_name("Bolt M8x20");
        let nut = PartRecord::from_product_name("Nut M10");
        assert!(!condition_holds(&Condition::BoltNutPair, &bolt, &nut));
        assert!(!condition_holds(&Condition::BoltNutPair, &bolt, &bolt));
    }

    #[test]
    fn test_best_match_keeps_earlier_on_tie() {
        let rules = vec![family_rule("R-FIRST", 5, "flange"), family_rule("R-SECOND", 5, "flange")];
        let a = flange("A", 50, 16);
        let matches = match_parts(&a, &a.clone(), &rules, &MatchPolicy::default());
        assert_eq!(best_match(&matches).unwrap().rule.rule_id, "R-FIRST");
        assert!(best_match(&[]).is_none());
    }

    #[test]
    fn test_name_contains_is_case_insensitive() {
        let cond = Condition::NameContains { value: "valve".into() };
        let valve = PartRecord::new("GV-50", PartFamily::Valve).with_name("GATE VALVE DN50");
        let pipe = PartRecord::new("P", PartFamily::Pipe);
        assert!(condition_holds(&cond, &pipe, &valve));
        assert!(!condition_holds(&cond, &pipe, &pipe));
    }

    #[test]
    fn test_spatial_conditions_never_match_records() {
        let a = flange("A", 50, 16);
        assert!(!condition_holds(&Condition::DistanceRange { min: 0.0, max: 1e9 }, &a, &a));
        assert!(!condition_holds(
            &Condition::MateType { mate_type: "coincident".into() },
            &a,
            &a
        ));
    }
}
