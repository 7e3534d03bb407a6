//! # Database Operations
//!
//! Persistence for the CMS core and the per-module migration system.
//!
//! ## Key Components
//!
//! - [`store`] - `ModuleStore`, `SchemaStore` and `ContentStore` traits, unified as `Store`
//! - [`memory`] - In-process store used by tests and embedded deployments
//! - [`postgres`] - `sqlx` Postgres store
//! - [`migrations`] - Module migration units and the runner that applies them
//! - [`migrator`] - Core schema migrations from the root `migrations/` directory
//! - [`ddl`] - Table and column definitions shared by both stores
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cms_core::config::DatabaseConfig;
//! use cms_core::database::{migrator, DatabaseConnection, PgStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabaseConnection::new(&DatabaseConfig::default()).await?;
//! migrator::run_core_migrations(db.pool()).await?;
//! let store = PgStore::new(db.pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod ddl;
pub mod memory;
pub mod migrations;
pub mod migrator;
pub mod postgres;
pub mod store;

pub use connection::DatabaseConnection;
pub use ddl::{ColumnDefinition, ColumnType, TableDefinition};
pub use memory::InMemoryStore;
pub use migrations::{
    discover_sql_migrations, MigrationDirection, MigrationKey, MigrationReport, MigrationRunner,
    MigrationUnit, SqlFileMigration, TableMigration,
};
pub use postgres::PgStore;
pub use store::{ContentStore, ModuleStore, SchemaStore, Store};
