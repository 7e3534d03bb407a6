//! # Core Schema Migrator
//!
//! The core tables (`modules`, `content_types`, `content_type_fields`,
//! `content`) are created by the SQL in the root `migrations/` directory.
//! Module-owned schema changes go through
//! [`MigrationRunner`](super::MigrationRunner) instead.
//!
//! ```rust,ignore
//! #[sqlx::test(migrator = "cms_core::database::migrator::MIGRATOR")]
//! async fn test_feature(pool: PgPool) { /* ... */ }
//! ```

use crate::error::CmsResult;
use sqlx::PgPool;
use tracing::info;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Apply outstanding core migrations
pub async fn run_core_migrations(pool: &PgPool) -> CmsResult<()> {
    info!("Running core schema migrations");
    MIGRATOR.run(pool).await?;
    info!("Core schema migrations complete");
    Ok(())
}
