//! # Module Migrations
//!
//! Each module owns an ordered set of reversible schema changes. Units are
//! ordered by the numeric prefix of their identity (`001_create_posts`),
//! applied ascending on install and reverted descending on uninstall.
//!
//! ## Failure Semantics
//!
//! The runner stops at the first failing unit and reports it as
//! [`CmsError::Migration`]. Units applied earlier in the same run are left in
//! place; each unit is responsible for its own atomicity and should use the
//! `table_exists` / `column_exists` checks to skip work already done.
//!
//! ## SQL Files
//!
//! Modules may ship SQL in `<module>/migrations/`:
//!
//! ```text
//! migrations/
//! ├── 001_create_posts.up.sql
//! ├── 001_create_posts.down.sql
//! └── 002_seed_categories.sql      # up only
//! ```

use super::ddl::TableDefinition;
use super::store::SchemaStore;
use crate::error::{CmsError, CmsResult};
use async_trait::async_trait;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sortable identity of a migration unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MigrationKey {
    pub ordinal: u64,
    /// Full identifier, e.g. `001_create_posts`
    pub id: String,
}

impl MigrationKey {
    /// Parse an identifier with a numeric prefix. Returns `None` when the
    /// identifier does not start with digits followed by `_` or the end.
    pub fn parse(id: &str) -> Option<Self> {
        let digits: String = id.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }

        let rest = &id[digits.len()..];
        if !(rest.is_empty() || rest.starts_with('_')) {
            return None;
        }

        Some(Self {
            ordinal: digits.parse().ok()?,
            id: id.to_string(),
        })
    }

    /// Human readable name without the numeric prefix
    pub fn name(&self) -> String {
        self.id
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim_start_matches('_')
            .replace('_', " ")
    }
}

/// Identifiers without a numeric prefix sort first, by id
impl From<&str> for MigrationKey {
    fn from(id: &str) -> Self {
        Self::parse(id).unwrap_or_else(|| Self {
            ordinal: 0,
            id: id.to_string(),
        })
    }
}

impl Ord for MigrationKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal
            .cmp(&other.ordinal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for MigrationKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MigrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// One reversible schema change
#[async_trait]
pub trait MigrationUnit: Send + Sync {
    fn key(&self) -> &MigrationKey;

    async fn up(&self, schema: &dyn SchemaStore) -> CmsResult<()>;

    async fn down(&self, _schema: &dyn SchemaStore) -> CmsResult<()> {
        Ok(())
    }
}

/// Creates a table on `up` unless it exists, drops it on `down` if present
#[derive(Debug, Clone)]
pub struct TableMigration {
    key: MigrationKey,
    table: TableDefinition,
}

impl TableMigration {
    pub fn new(key: impl Into<String>, table: TableDefinition) -> Self {
        let key: String = key.into();
        Self {
            key: MigrationKey::from(key.as_str()),
            table,
        }
    }

    pub fn table(&self) -> &TableDefinition {
        &self.table
    }
}

#[async_trait]
impl MigrationUnit for TableMigration {
    fn key(&self) -> &MigrationKey {
        &self.key
    }

    async fn up(&self, schema: &dyn SchemaStore) -> CmsResult<()> {
        if schema.table_exists(&self.table.name).await? {
            debug!(table = %self.table.name, "Table already exists, skipping create");
            return Ok(());
        }
        schema.create_table(&self.table).await
    }

    async fn down(&self, schema: &dyn SchemaStore) -> CmsResult<()> {
        if !schema.table_exists(&self.table.name).await? {
            return Ok(());
        }
        schema.drop_table(&self.table.name).await
    }
}

/// SQL script pair discovered on disk
#[derive(Debug, Clone)]
pub struct SqlFileMigration {
    key: MigrationKey,
    pub up_path: PathBuf,
    pub down_path: Option<PathBuf>,
}

impl SqlFileMigration {
    async fn run_script(schema: &dyn SchemaStore, path: &Path) -> CmsResult<()> {
        let sql = tokio::fs::read_to_string(path).await?;
        if sql.trim().is_empty() {
            return Ok(());
        }
        schema.execute_sql(&sql).await
    }
}

#[async_trait]
impl MigrationUnit for SqlFileMigration {
    fn key(&self) -> &MigrationKey {
        &self.key
    }

    async fn up(&self, schema: &dyn SchemaStore) -> CmsResult<()> {
        Self::run_script(schema, &self.up_path).await
    }

    async fn down(&self, schema: &dyn SchemaStore) -> CmsResult<()> {
        match &self.down_path {
            Some(path) => Self::run_script(schema, path).await,
            None => Ok(()),
        }
    }
}

/// Split `001_create_posts.up` into the key and its direction
fn parse_migration_filename(stem: &str) -> Option<(MigrationKey, bool)> {
    let (id, is_down) = if let Some(id) = stem.strip_suffix(".down") {
        (id, true)
    } else if let Some(id) = stem.strip_suffix(".up") {
        (id, false)
    } else {
        (stem, false)
    };

    MigrationKey::parse(id).map(|key| (key, is_down))
}

/// Collect SQL migrations from a directory, sorted by key. A missing
/// directory yields no migrations; files without a numeric prefix are
/// skipped with a warning.
pub fn discover_sql_migrations(dir: &Path) -> CmsResult<Vec<SqlFileMigration>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut ups: BTreeMap<MigrationKey, PathBuf> = BTreeMap::new();
    let mut downs: BTreeMap<MigrationKey, PathBuf> = BTreeMap::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().map(|e| e != "sql").unwrap_or(true) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        match parse_migration_filename(stem) {
            Some((key, true)) => {
                downs.insert(key, path);
            }
            Some((key, false)) => {
                ups.insert(key, path);
            }
            None => warn!(path = %path.display(), "Ignoring migration file without numeric prefix"),
        }
    }

    for key in downs.keys() {
        if !ups.contains_key(key) {
            warn!(migration = %key, "Down migration has no matching up migration");
        }
    }

    Ok(ups
        .into_iter()
        .map(|(key, up_path)| {
            let down_path = downs.remove(&key);
            SqlFileMigration {
                key,
                up_path,
                down_path,
            }
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationDirection {
    Up,
    Down,
}

/// Units completed by one runner call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub module: String,
    pub direction: MigrationDirection,
    pub completed: Vec<String>,
}

/// Applies or reverts a module's migration units in key order
pub struct MigrationRunner<'a> {
    schema: &'a dyn SchemaStore,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(schema: &'a dyn SchemaStore) -> Self {
        Self { schema }
    }

    fn ordered(
        module: &str,
        units: &[Arc<dyn MigrationUnit>],
    ) -> CmsResult<Vec<Arc<dyn MigrationUnit>>> {
        let mut ordered: Vec<Arc<dyn MigrationUnit>> = units.to_vec();
        ordered.sort_by(|a, b| a.key().cmp(b.key()));

        if let Some(pair) = ordered.windows(2).find(|pair| pair[0].key() == pair[1].key()) {
            return Err(CmsError::validation(format!(
                "Module '{module}' declares migration '{}' twice",
                pair[0].key()
            )));
        }
        Ok(ordered)
    }

    /// Run `up` ascending, stopping at the first failure
    pub async fn apply(
        &self,
        module: &str,
        units: &[Arc<dyn MigrationUnit>],
    ) -> CmsResult<MigrationReport> {
        let ordered = Self::ordered(module, units)?;
        let mut report = MigrationReport {
            module: module.to_string(),
            direction: MigrationDirection::Up,
            completed: Vec::with_capacity(ordered.len()),
        };

        for unit in ordered {
            debug!(module = %module, migration = %unit.key(), "Applying migration");
            unit.up(self.schema)
                .await
                .map_err(|e| CmsError::Migration {
                    module: module.to_string(),
                    unit: unit.key().to_string(),
                    reason: e.to_string(),
                })?;
            report.completed.push(unit.key().to_string());
        }

        if !report.completed.is_empty() {
            info!(module = %module, count = report.completed.len(), "Applied migrations");
        }
        Ok(report)
    }

    /// Run `down` descending, stopping at the first failure
    pub async fn revert(
        &self,
        module: &str,
        units: &[Arc<dyn MigrationUnit>],
    ) -> CmsResult<MigrationReport> {
        let ordered = Self::ordered(module, units)?;
        let mut report = MigrationReport {
            module: module.to_string(),
            direction: MigrationDirection::Down,
            completed: Vec::with_capacity(ordered.len()),
        };

        for unit in ordered.into_iter().rev() {
            debug!(module = %module, migration = %unit.key(), "Reverting migration");
            unit.down(self.schema)
                .await
                .map_err(|e| CmsError::Migration {
                    module: module.to_string(),
                    unit: unit.key().to_string(),
                    reason: e.to_string(),
                })?;
            report.completed.push(unit.key().to_string());
        }

        if !report.completed.is_empty() {
            info!(module = %module, count = report.completed.len(), "Reverted migrations");
        }
        Ok(report)
    }
}
