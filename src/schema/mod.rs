//! Schema system - validation of catalog records

pub mod registry;
pub mod validator;

pub use registry::{RecordKind, SchemaRegistry};
pub use validator::{SchemaViolation, ValidationError, Validator};
