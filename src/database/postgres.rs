//! # Postgres Store
//!
//! [`Store`](super::Store) backed by a `sqlx` Postgres pool. Queries are
//! runtime-checked so the crate builds without a live database; the core
//! schema comes from [`migrator::MIGRATOR`](super::migrator::MIGRATOR).
//!
//! Unique violations surface as `Conflict` through `From<sqlx::Error>`, which
//! is what turns a concurrent duplicate install into "already installed".

use super::ddl::{validate_identifier, ColumnDefinition, TableDefinition};
use super::store::{ContentStore, ModuleStore, SchemaStore};
use crate::error::{CmsError, CmsResult};
use crate::models::{
    ContentRecord, ContentType, ContentTypeField, FieldUpdate, ModuleRecord, ModuleStatus,
    NewContent, NewContentType, NewContentTypeField, NewModuleRecord,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const MODULE_COLUMNS: &str =
    "id, name, slug, description, status, version, config, created_at, updated_at, installed_at";
const CONTENT_TYPE_COLUMNS: &str =
    "id, name, label, slug, description, is_active, menu_position, icon, created_at, updated_at";
const FIELD_COLUMNS: &str = "id, content_type_id, name, label, field_type, is_required, \
                             options, validation, \"order\", created_at, updated_at";
const CONTENT_COLUMNS: &str =
    "id, content_type_id, title, slug, status, author_id, fields, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// JSON stored as text; unparseable text reads back as an empty object
fn json_text(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::Object(Map::new()))
}

fn json_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn module_from_row(row: &PgRow) -> CmsResult<ModuleRecord> {
    let status: String = row.try_get("status")?;
    let config: String = row.try_get("config")?;

    Ok(ModuleRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        status: status.parse().map_err(CmsError::Storage)?,
        version: row.try_get("version")?,
        config: json_object(json_text(&config)),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        installed_at: row.try_get("installed_at")?,
    })
}

fn content_type_from_row(row: &PgRow) -> CmsResult<ContentType> {
    Ok(ContentType {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        label: row.try_get("label")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        menu_position: row.try_get("menu_position")?,
        icon: row.try_get("icon")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn field_from_row(row: &PgRow) -> CmsResult<ContentTypeField> {
    let field_type: String = row.try_get("field_type")?;
    let options: String = row.try_get("options")?;
    let validation: String = row.try_get("validation")?;

    Ok(ContentTypeField {
        id: row.try_get("id")?,
        content_type_id: row.try_get("content_type_id")?,
        name: row.try_get("name")?,
        label: row.try_get("label")?,
        field_type: field_type.parse().map_err(CmsError::Storage)?,
        is_required: row.try_get("is_required")?,
        options: json_text(&options),
        validation: json_text(&validation),
        order: row.try_get("order")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn content_from_row(row: &PgRow) -> CmsResult<ContentRecord> {
    let fields: Value = row.try_get("fields")?;

    Ok(ContentRecord {
        id: row.try_get("id")?,
        content_type_id: row.try_get("content_type_id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        status: row.try_get("status")?,
        author_id: row.try_get("author_id")?,
        fields: json_object(fields),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ModuleStore for PgStore {
    async fn find_module(&self, slug: &str) -> CmsResult<Option<ModuleRecord>> {
        let row = sqlx::query(&format!("SELECT {MODULE_COLUMNS} FROM modules WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(module_from_row).transpose()
    }

    async fn list_modules(&self) -> CmsResult<Vec<ModuleRecord>> {
        let rows = sqlx::query(&format!("SELECT {MODULE_COLUMNS} FROM modules ORDER BY slug"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(module_from_row).collect()
    }

    async fn list_modules_by_status(&self, status: ModuleStatus) -> CmsResult<Vec<ModuleRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {MODULE_COLUMNS} FROM modules WHERE status = $1 ORDER BY slug"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(module_from_row).collect()
    }

    async fn insert_module(&self, record: NewModuleRecord) -> CmsResult<ModuleRecord> {
        let config = serde_json::to_string(&record.config)?;
        let row = sqlx::query(&format!(
            "INSERT INTO modules (name, slug, description, status, version, config) \
             VALUES ($1, $2, $3, 'inactive', $4, $5) RETURNING {MODULE_COLUMNS}"
        ))
        .bind(&record.name)
        .bind(&record.slug)
        .bind(&record.description)
        .bind(&record.version)
        .bind(config)
        .fetch_one(&self.pool)
        .await?;

        module_from_row(&row)
    }

    async fn update_module_status(&self, slug: &str, status: ModuleStatus) -> CmsResult<ModuleRecord> {
        let row = sqlx::query(&format!(
            "UPDATE modules SET status = $2, updated_at = NOW() WHERE slug = $1 \
             RETURNING {MODULE_COLUMNS}"
        ))
        .bind(slug)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CmsError::not_found(format!("module record '{slug}'")))?;

        module_from_row(&row)
    }

    async fn delete_module(&self, slug: &str) -> CmsResult<bool> {
        let result = sqlx::query("DELETE FROM modules WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SchemaStore for PgStore {
    async fn table_exists(&self, table: &str) -> CmsResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn column_exists(&self, table: &str, column: &str) -> CmsResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2)",
        )
        .bind(table)
        .bind(column)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create_table(&self, table: &TableDefinition) -> CmsResult<()> {
        table.validate()?;
        if self.table_exists(&table.name).await? {
            return Err(CmsError::conflict(format!(
                "relation \"{}\" already exists",
                table.name
            )));
        }

        sqlx::raw_sql(&table.to_create_sql())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> CmsResult<()> {
        validate_identifier(table)?;
        if !self.table_exists(table).await? {
            return Err(CmsError::not_found(format!("table \"{table}\"")));
        }

        sqlx::raw_sql(&format!("DROP TABLE {table}"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &ColumnDefinition) -> CmsResult<()> {
        validate_identifier(table)?;
        validate_identifier(&column.name)?;

        sqlx::raw_sql(&format!("ALTER TABLE {table} ADD COLUMN {}", column.to_sql()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn drop_column(&self, table: &str, column: &str) -> CmsResult<()> {
        validate_identifier(table)?;
        validate_identifier(column)?;

        sqlx::raw_sql(&format!("ALTER TABLE {table} DROP COLUMN {column}"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn execute_sql(&self, sql: &str) -> CmsResult<()> {
        sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn insert_content_type(&self, content_type: &NewContentType) -> CmsResult<ContentType> {
        let slug = content_type
            .slug
            .clone()
            .unwrap_or_else(|| content_type.name.clone());

        let row = sqlx::query(&format!(
            "INSERT INTO content_types (name, label, slug, description, is_active, menu_position, icon) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {CONTENT_TYPE_COLUMNS}"
        ))
        .bind(&content_type.name)
        .bind(&content_type.label)
        .bind(slug)
        .bind(&content_type.description)
        .bind(content_type.is_active)
        .bind(content_type.menu_position)
        .bind(&content_type.icon)
        .fetch_one(&self.pool)
        .await?;

        content_type_from_row(&row)
    }

    async fn find_content_type(&self, id: i64) -> CmsResult<Option<ContentType>> {
        let row = sqlx::query(&format!(
            "SELECT {CONTENT_TYPE_COLUMNS} FROM content_types WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(content_type_from_row).transpose()
    }

    async fn find_content_type_by_slug(&self, slug: &str) -> CmsResult<Option<ContentType>> {
        let row = sqlx::query(&format!(
            "SELECT {CONTENT_TYPE_COLUMNS} FROM content_types WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(content_type_from_row).transpose()
    }

    async fn list_content_types(&self) -> CmsResult<Vec<ContentType>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTENT_TYPE_COLUMNS} FROM content_types ORDER BY menu_position, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(content_type_from_row).collect()
    }

    async fn delete_content_type(&self, id: i64) -> CmsResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM content_type_fields WHERE content_type_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM content_types WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_field(
        &self,
        content_type_id: i64,
        field: &NewContentTypeField,
    ) -> CmsResult<ContentTypeField> {
        let options = field
            .options
            .clone()
            .unwrap_or_else(|| field.field_type.default_options());
        let validation = field
            .validation
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let row = sqlx::query(&format!(
            "INSERT INTO content_type_fields \
             (content_type_id, name, label, field_type, is_required, options, validation, \"order\") \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {FIELD_COLUMNS}"
        ))
        .bind(content_type_id)
        .bind(&field.name)
        .bind(field.label.clone().unwrap_or_else(|| field.name.clone()))
        .bind(field.field_type.as_str())
        .bind(field.is_required)
        .bind(serde_json::to_string(&options)?)
        .bind(serde_json::to_string(&validation)?)
        .bind(field.order.unwrap_or(0))
        .fetch_one(&self.pool)
        .await?;

        field_from_row(&row)
    }

    async fn find_field(&self, id: i64) -> CmsResult<Option<ContentTypeField>> {
        let row = sqlx::query(&format!(
            "SELECT {FIELD_COLUMNS} FROM content_type_fields WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(field_from_row).transpose()
    }

    async fn find_field_by_name(
        &self,
        content_type_id: i64,
        name: &str,
    ) -> CmsResult<Option<ContentTypeField>> {
        let row = sqlx::query(&format!(
            "SELECT {FIELD_COLUMNS} FROM content_type_fields \
             WHERE content_type_id = $1 AND name = $2"
        ))
        .bind(content_type_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(field_from_row).transpose()
    }

    async fn list_fields(&self, content_type_id: i64) -> CmsResult<Vec<ContentTypeField>> {
        let rows = sqlx::query(&format!(
            "SELECT {FIELD_COLUMNS} FROM content_type_fields \
             WHERE content_type_id = $1 ORDER BY \"order\", id"
        ))
        .bind(content_type_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(field_from_row).collect()
    }

    async fn update_field(&self, id: i64, update: &FieldUpdate) -> CmsResult<ContentTypeField> {
        let options = update.options.as_ref().map(serde_json::to_string).transpose()?;
        let validation = update
            .validation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let row = sqlx::query(&format!(
            "UPDATE content_type_fields SET \
             label = COALESCE($2, label), \
             field_type = COALESCE($3, field_type), \
             is_required = COALESCE($4, is_required), \
             options = COALESCE($5, options), \
             validation = COALESCE($6, validation), \
             \"order\" = COALESCE($7, \"order\"), \
             updated_at = NOW() \
             WHERE id = $1 RETURNING {FIELD_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.label)
        .bind(update.field_type.map(|t| t.as_str()))
        .bind(update.is_required)
        .bind(options)
        .bind(validation)
        .bind(update.order)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CmsError::not_found(format!("field {id}")))?;

        field_from_row(&row)
    }

    async fn delete_field(&self, id: i64) -> CmsResult<bool> {
        let result = sqlx::query("DELETE FROM content_type_fields WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn max_field_order(&self, content_type_id: i64) -> CmsResult<Option<i32>> {
        let max = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(\"order\") FROM content_type_fields WHERE content_type_id = $1",
        )
        .bind(content_type_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(max)
    }

    async fn insert_content(&self, content: &NewContent) -> CmsResult<ContentRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO content (content_type_id, title, slug, status, author_id, fields) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {CONTENT_COLUMNS}"
        ))
        .bind(content.content_type_id)
        .bind(&content.title)
        .bind(&content.slug)
        .bind(&content.status)
        .bind(content.author_id)
        .bind(Value::Object(content.fields.clone()))
        .fetch_one(&self.pool)
        .await?;

        content_from_row(&row)
    }

    async fn update_content(&self, id: i64, content: &NewContent) -> CmsResult<ContentRecord> {
        let row = sqlx::query(&format!(
            "UPDATE content SET title = $2, slug = $3, status = $4, author_id = $5, fields = $6, \
             updated_at = NOW() WHERE id = $1 RETURNING {CONTENT_COLUMNS}"
        ))
        .bind(id)
        .bind(&content.title)
        .bind(&content.slug)
        .bind(&content.status)
        .bind(content.author_id)
        .bind(Value::Object(content.fields.clone()))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CmsError::not_found(format!("content {id}")))?;

        content_from_row(&row)
    }

    async fn find_content(&self, id: i64) -> CmsResult<Option<ContentRecord>> {
        let row = sqlx::query(&format!("SELECT {CONTENT_COLUMNS} FROM content WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(content_from_row).transpose()
    }

    async fn count_content_for_type(&self, content_type_id: i64) -> CmsResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM content WHERE content_type_id = $1",
        )
        .bind(content_type_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete_content(&self, id: i64) -> CmsResult<bool> {
        let result = sqlx::query("DELETE FROM content WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
