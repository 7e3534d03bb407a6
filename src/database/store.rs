//! Persistence seams for the CMS core.
//!
//! The core only talks to storage through these traits, so the same
//! lifecycle and schema logic runs against Postgres ([`PgStore`]) or the
//! in-process [`InMemoryStore`].
//!
//! [`PgStore`]: super::PgStore
//! [`InMemoryStore`]: super::InMemoryStore

use super::ddl::{ColumnDefinition, TableDefinition};
use crate::error::CmsResult;
use crate::models::{
    ContentRecord, ContentType, ContentTypeField, FieldUpdate, ModuleRecord, ModuleStatus,
    NewContent, NewContentType, NewContentTypeField, NewModuleRecord,
};
use async_trait::async_trait;

/// Rows of the `modules` table
#[async_trait]
pub trait ModuleStore: Send + Sync {
    async fn find_module(&self, slug: &str) -> CmsResult<Option<ModuleRecord>>;

    /// All records ordered by slug
    async fn list_modules(&self) -> CmsResult<Vec<ModuleRecord>>;

    async fn list_modules_by_status(&self, status: ModuleStatus) -> CmsResult<Vec<ModuleRecord>>;

    /// Insert with status `inactive`. Must fail with `Conflict` when the slug
    /// already exists; this is the guard against concurrent installs.
    async fn insert_module(&self, record: NewModuleRecord) -> CmsResult<ModuleRecord>;

    /// `NotFound` when no record has this slug
    async fn update_module_status(&self, slug: &str, status: ModuleStatus) -> CmsResult<ModuleRecord>;

    /// Returns whether a row was deleted
    async fn delete_module(&self, slug: &str) -> CmsResult<bool>;
}

/// Schema operations available to migration units
#[async_trait]
pub trait SchemaStore: Send + Sync {
    async fn table_exists(&self, table: &str) -> CmsResult<bool>;

    async fn column_exists(&self, table: &str, column: &str) -> CmsResult<bool>;

    /// `Conflict` when the table already exists
    async fn create_table(&self, table: &TableDefinition) -> CmsResult<()>;

    /// `NotFound` when the table does not exist
    async fn drop_table(&self, table: &str) -> CmsResult<()>;

    async fn add_column(&self, table: &str, column: &ColumnDefinition) -> CmsResult<()>;

    async fn drop_column(&self, table: &str, column: &str) -> CmsResult<()>;

    /// Raw SQL; only meaningful for SQL-backed stores
    async fn execute_sql(&self, sql: &str) -> CmsResult<()>;
}

/// Content types, their fields, and content rows
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// `Conflict` on duplicate name or slug. `content_type.slug` is resolved
    /// by the caller.
    async fn insert_content_type(&self, content_type: &NewContentType) -> CmsResult<ContentType>;

    async fn find_content_type(&self, id: i64) -> CmsResult<Option<ContentType>>;

    async fn find_content_type_by_slug(&self, slug: &str) -> CmsResult<Option<ContentType>>;

    /// Ordered by `menu_position`, then name
    async fn list_content_types(&self) -> CmsResult<Vec<ContentType>>;

    /// Deletes the content type and its fields
    async fn delete_content_type(&self, id: i64) -> CmsResult<bool>;

    /// `Conflict` on duplicate `(content_type_id, name)`. Unresolved
    /// optional values are stored as their defaults.
    async fn insert_field(
        &self,
        content_type_id: i64,
        field: &NewContentTypeField,
    ) -> CmsResult<ContentTypeField>;

    async fn find_field(&self, id: i64) -> CmsResult<Option<ContentTypeField>>;

    async fn find_field_by_name(
        &self,
        content_type_id: i64,
        name: &str,
    ) -> CmsResult<Option<ContentTypeField>>;

    /// Ordered by `order`, then id
    async fn list_fields(&self, content_type_id: i64) -> CmsResult<Vec<ContentTypeField>>;

    async fn update_field(&self, id: i64, update: &FieldUpdate) -> CmsResult<ContentTypeField>;

    async fn delete_field(&self, id: i64) -> CmsResult<bool>;

    /// Highest `order` among the type's fields, `None` when it has none
    async fn max_field_order(&self, content_type_id: i64) -> CmsResult<Option<i32>>;

    async fn insert_content(&self, content: &NewContent) -> CmsResult<ContentRecord>;

    async fn update_content(&self, id: i64, content: &NewContent) -> CmsResult<ContentRecord>;

    async fn find_content(&self, id: i64) -> CmsResult<Option<ContentRecord>>;

    async fn count_content_for_type(&self, content_type_id: i64) -> CmsResult<i64>;

    async fn delete_content(&self, id: i64) -> CmsResult<bool>;
}

/// Everything the CMS core persists
pub trait Store: ModuleStore + SchemaStore + ContentStore {
    fn schema(&self) -> &dyn SchemaStore;
}

impl<T> Store for T
where
    T: ModuleStore + SchemaStore + ContentStore + 'static,
{
    fn schema(&self) -> &dyn SchemaStore {
        self
    }
}
