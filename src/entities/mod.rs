//! Entity type definitions
//!
//! The engine works on four kinds of records:
//!
//! **Catalog (read-only):**
//! - [`PartRecord`] - A discrete part with family, DN/PN and free-form metadata
//! - [`ConstraintRule`] - Declarative condition/action pair with a priority
//!
//! **Per run:**
//! - [`PartInstance`] - An occurrence of a part in one assembly
//! - [`Constraint`] - A rule applied to a pair of instances
//! - [`Placement`] - The resolved pose of an instance

pub mod constraint;
pub mod instance;
pub mod part;
pub mod rule;

pub use constraint::{Constraint, ConstraintParameters, ConstraintType, FastenerSpec};
pub use instance::{rotation_matrix, InstanceRole, PartInstance, Placement, PlacementSource};
pub use part::{PartFamily, PartRecord};
pub use rule::{AttributePredicate, Condition, ConstraintRule, RuleAction};
