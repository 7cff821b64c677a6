//! CLI command implementations

pub mod completions;
pub mod init;
pub mod match_parts;
pub mod parse;
pub mod parts;
pub mod rules;
pub mod solve;
pub mod store;
pub mod validate;
