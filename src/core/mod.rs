//! Core module - project layout, configuration, logging and catalog stores

pub mod config;
pub mod loader;
pub mod logging;
pub mod project;
pub mod store;

pub use config::{Config, Policy, StoreBackend};
pub use project::{Project, ProjectError};
pub use store::{CatalogStore, FileStore, PartFilter, SqliteStore, StoreError};
