//! SQLite catalog store
//!
//! The database is a derived artifact: it is rebuilt from the YAML records
//! whenever their fingerprint changes and can be deleted at any time.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{sort_rules, CatalogStore, FileStore, PartFilter, StoreError};
use crate::entities::{ConstraintRule, PartRecord};

/// Current schema version - the database is rebuilt on mismatch
const SCHEMA_VERSION: i32 = 1;

/// Catalog backed by a local SQLite database
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

/// Summary of the database contents
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub path: PathBuf,
    pub schema_version: i32,
    pub parts: usize,
    pub rules: usize,
    pub active_rules: usize,
    pub fingerprint: Option<String>,
    pub synced_at: Option<String>,
    pub db_size_bytes: u64,
}

/// Outcome of a sync
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    /// Whether the database had to be rewritten
    pub rebuilt: bool,
    pub files_scanned: usize,
    pub parts: usize,
    pub rules: usize,
    pub duration_ms: u64,
}

impl SqliteStore {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let mut store = Self {
            conn,
            path: path.to_path_buf(),
        };

        if store.schema_version()? != SCHEMA_VERSION {
            store.reinitialize_schema()?;
        }

        Ok(store)
    }

    /// Open the database and bring it up to date with the YAML records
    pub fn open_synced(path: &Path, files: &FileStore) -> Result<Self, StoreError> {
        let mut store = Self::open(path)?;
        store.sync_from(files)?;
        Ok(store)
    }

    fn schema_version(&self) -> Result<i32, StoreError> {
        let table: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type='table' AND name='schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if table.is_none() {
            return Ok(0);
        }

        let version: Option<i32> = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(version.unwrap_or(0))
    }

    /// Drop all tables and create the current schema
    fn reinitialize_schema(&mut self) -> Result<(), StoreError> {
        tracing::info!("initializing catalog database schema v{}", SCHEMA_VERSION);
        self.conn.execute_batch(
            r#"
            DROP TABLE IF EXISTS schema_version;
            DROP TABLE IF EXISTS store_meta;
            DROP TABLE IF EXISTS parts;
            DROP TABLE IF EXISTS assembly_rules;

            CREATE TABLE schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE parts (
                part_id TEXT PRIMARY KEY,
                name TEXT,
                family TEXT NOT NULL,
                dn INTEGER,
                pn INTEGER,
                end_type TEXT,
                face_type TEXT,
                record TEXT NOT NULL
            );
            CREATE INDEX idx_parts_family ON parts(family);

            CREATE TABLE assembly_rules (
                rule_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                priority INTEGER NOT NULL,
                condition_type TEXT NOT NULL,
                constraint_type TEXT NOT NULL,
                active INTEGER NOT NULL,
                record TEXT NOT NULL
            );
            CREATE INDEX idx_rules_priority ON assembly_rules(priority);
            "#,
        )?;
        self.conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    fn meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Rebuild the database when the YAML records changed since the last sync
    pub fn sync_from(&mut self, files: &FileStore) -> Result<SyncStats, StoreError> {
        let start = std::time::Instant::now();
        let sources = files.source_files();
        let fingerprint = fingerprint(&sources)?;

        let mut stats = SyncStats {
            files_scanned: sources.len(),
            ..Default::default()
        };

        if self.meta("fingerprint")?.as_deref() == Some(fingerprint.as_str()) {
            tracing::debug!("catalog database is current");
            stats.parts = self.count("parts")?;
            stats.rules = self.count("assembly_rules")?;
            stats.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(stats);
        }

        let parts = files.all_parts();
        let rules = files.all_rules();

        let tx = self.conn.transaction()?;
        tx.execute_batch("DELETE FROM parts; DELETE FROM assembly_rules;")?;
        for part in &parts {
            let record = serde_json::to_string(part).map_err(|e| StoreError::Record {
                id: part.part_id.clone(),
                reason: e.to_string(),
            })?;
            tx.execute(
                "INSERT OR REPLACE INTO parts
                    (part_id, name, family, dn, pn, end_type, face_type, record)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    part.part_id,
                    part.name,
                    part.family.to_string(),
                    part.dn,
                    part.pn,
                    part.end_type,
                    part.face_type,
                    record
                ],
            )?;
        }
        for rule in &rules {
            let record = serde_json::to_string(rule).map_err(|e| StoreError::Record {
                id: rule.rule_id.clone(),
                reason: e.to_string(),
            })?;
            tx.execute(
                "INSERT OR REPLACE INTO assembly_rules
                    (rule_id, name, priority, condition_type, constraint_type, active, record)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    rule.rule_id,
                    rule.name,
                    rule.priority,
                    rule.condition.kind(),
                    rule.action.constraint_type.to_string(),
                    rule.active,
                    record
                ],
            )?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO store_meta (key, value) VALUES ('fingerprint', ?1)",
            params![fingerprint],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO store_meta (key, value) VALUES ('synced_at', ?1)",
            params![chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        stats.rebuilt = true;
        stats.parts = parts.len();
        stats.rules = rules.len();
        stats.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "catalog database rebuilt: {} parts, {} rules",
            stats.parts,
            stats.rules
        );
        Ok(stats)
    }

    fn count(&self, table: &str) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
        Ok(n as usize)
    }

    pub fn info(&self) -> Result<StoreInfo, StoreError> {
        let active: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM assembly_rules WHERE active = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(StoreInfo {
            path: self.path.clone(),
            schema_version: self.schema_version()?,
            parts: self.count("parts")?,
            rules: self.count("assembly_rules")?,
            active_rules: active as usize,
            fingerprint: self.meta("fingerprint")?,
            synced_at: self.meta("synced_at")?,
            db_size_bytes: fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
        })
    }
}

impl CatalogStore for SqliteStore {
    fn active_rules(&self) -> Result<Vec<ConstraintRule>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT rule_id, record FROM assembly_rules
             WHERE active = 1
             ORDER BY priority DESC, rule_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut rules = Vec::new();
        for row in rows {
            let (id, record) = row?;
            let rule: ConstraintRule = serde_json::from_str(&record).map_err(|e| {
                StoreError::Record {
                    id,
                    reason: e.to_string(),
                }
            })?;
            rules.push(rule);
        }
        sort_rules(&mut rules);
        Ok(rules)
    }

    fn parts(&self, filter: &PartFilter) -> Result<Vec<PartRecord>, StoreError> {
        let family = filter.family.map(|f| f.to_string());
        let mut stmt = self.conn.prepare(
            "SELECT part_id, record FROM parts
             WHERE (?1 IS NULL OR family = ?1)
             ORDER BY part_id ASC",
        )?;
        let rows = stmt.query_map(params![family], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut parts = Vec::new();
        for row in rows {
            let (id, record) = row?;
            let part: PartRecord = serde_json::from_str(&record).map_err(|e| {
                StoreError::Record {
                    id,
                    reason: e.to_string(),
                }
            })?;
            if filter.matches(&part) {
                parts.push(part);
            }
        }
        Ok(parts)
    }
}

/// SHA-256 over the paths and contents of the source files
fn fingerprint(sources: &[PathBuf]) -> Result<String, StoreError> {
    let mut hasher = Sha256::new();
    for path in sources {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(fs::read(path)?);
        hasher.update([0u8]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
