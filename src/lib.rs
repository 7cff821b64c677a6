//! Tessera Assembly: rule-based reconstruction of piping assemblies
//!
//! Parts come from a catalog or a STEP exchange file. Declarative rules
//! relate pairs of parts, the resulting constraints are propagated into
//! placements, flange connections receive synthesized bolts and gaskets,
//! and the result is exported as a JSON scene description.

pub mod cli;
pub mod core;
pub mod engine;
pub mod entities;
pub mod scene;
pub mod schema;
pub mod step;
