//! # In-Memory Store
//!
//! A [`Store`](super::Store) kept entirely in process memory. Useful for
//! tests, demos and embedding the CMS core without a database. It enforces
//! the same uniqueness rules as the Postgres schema and keeps a catalog of
//! table definitions so migration units can create and drop tables.

use super::ddl::{ColumnDefinition, ColumnType, TableDefinition};
use super::store::{ContentStore, ModuleStore, SchemaStore};
use crate::error::{CmsError, CmsResult};
use crate::models::{
    ContentRecord, ContentType, ContentTypeField, FieldUpdate, ModuleRecord, ModuleStatus,
    NewContent, NewContentType, NewContentTypeField, NewModuleRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct MemoryState {
    modules: BTreeMap<String, ModuleRecord>,
    next_module_id: i64,
    tables: BTreeMap<String, TableDefinition>,
    content_types: BTreeMap<i64, ContentType>,
    next_content_type_id: i64,
    fields: BTreeMap<i64, ContentTypeField>,
    next_field_id: i64,
    content: BTreeMap<i64, ContentRecord>,
    next_content_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// Tables the core schema creates, mirrored into the catalog so
/// `table_exists("modules")` behaves as it would on Postgres
fn core_tables() -> Vec<TableDefinition> {
    vec![
        TableDefinition::new("modules")
            .column(ColumnDefinition::new("name", ColumnType::Varchar(255)))
            .column(ColumnDefinition::new("slug", ColumnType::Varchar(255)).unique())
            .column(ColumnDefinition::new("description", ColumnType::Text).nullable())
            .column(ColumnDefinition::new("status", ColumnType::Varchar(20)))
            .column(ColumnDefinition::new("version", ColumnType::Varchar(50)))
            .column(ColumnDefinition::new("config", ColumnType::Text))
            .timestamps()
            .column(ColumnDefinition::new("installed_at", ColumnType::Timestamp)),
        TableDefinition::new("content_types")
            .column(ColumnDefinition::new("name", ColumnType::Varchar(255)).unique())
            .column(ColumnDefinition::new("label", ColumnType::Varchar(255)))
            .column(ColumnDefinition::new("slug", ColumnType::Varchar(255)).unique())
            .column(ColumnDefinition::new("description", ColumnType::Text).nullable())
            .column(ColumnDefinition::new("is_active", ColumnType::Boolean))
            .column(ColumnDefinition::new("menu_position", ColumnType::Integer))
            .column(ColumnDefinition::new("icon", ColumnType::Varchar(100)).nullable())
            .timestamps(),
        TableDefinition::new("content_type_fields")
            .column(ColumnDefinition::new("content_type_id", ColumnType::BigInteger))
            .column(ColumnDefinition::new("name", ColumnType::Varchar(255)))
            .column(ColumnDefinition::new("label", ColumnType::Varchar(255)))
            .column(ColumnDefinition::new("field_type", ColumnType::Varchar(50)))
            .column(ColumnDefinition::new("is_required", ColumnType::Boolean))
            .column(ColumnDefinition::new("options", ColumnType::Text))
            .column(ColumnDefinition::new("validation", ColumnType::Text))
            .column(ColumnDefinition::new("order", ColumnType::Integer))
            .timestamps(),
        TableDefinition::new("content")
            .column(ColumnDefinition::new("content_type_id", ColumnType::BigInteger))
            .column(ColumnDefinition::new("title", ColumnType::Varchar(255)))
            .column(ColumnDefinition::new("slug", ColumnType::Varchar(255)).nullable())
            .column(ColumnDefinition::new("status", ColumnType::Varchar(20)))
            .column(ColumnDefinition::new("author_id", ColumnType::BigInteger).nullable())
            .column(ColumnDefinition::new("fields", ColumnType::Json))
            .timestamps(),
    ]
}

/// Thread-safe in-memory implementation of every store trait
#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    unavailable: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        for table in core_tables() {
            state.tables.insert(table.name.clone(), table);
        }

        Self {
            state: RwLock::new(state),
            unavailable: AtomicBool::new(false),
        }
    }

    /// While set, every operation fails with a `Storage` error, as if the
    /// database were unreachable
    pub fn simulate_outage(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Names of every table in the catalog
    pub fn table_names(&self) -> Vec<String> {
        self.state.read().tables.keys().cloned().collect()
    }

    fn check_available(&self) -> CmsResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CmsError::storage("in-memory store is unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ModuleStore for InMemoryStore {
    async fn find_module(&self, slug: &str) -> CmsResult<Option<ModuleRecord>> {
        self.check_available()?;
        Ok(self.state.read().modules.get(slug).cloned())
    }

    async fn list_modules(&self) -> CmsResult<Vec<ModuleRecord>> {
        self.check_available()?;
        Ok(self.state.read().modules.values().cloned().collect())
    }

    async fn list_modules_by_status(&self, status: ModuleStatus) -> CmsResult<Vec<ModuleRecord>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .modules
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect())
    }

    async fn insert_module(&self, record: NewModuleRecord) -> CmsResult<ModuleRecord> {
        self.check_available()?;
        let mut state = self.state.write();

        if state.modules.contains_key(&record.slug) {
            return Err(CmsError::conflict(format!(
                "duplicate key value violates unique constraint \"modules_slug_key\" ({})",
                record.slug
            )));
        }

        let now = Utc::now();
        let module = ModuleRecord {
            id: next_id(&mut state.next_module_id),
            name: record.name,
            slug: record.slug.clone(),
            description: record.description,
            status: ModuleStatus::Inactive,
            version: record.version,
            config: record.config,
            created_at: now,
            updated_at: now,
            installed_at: now,
        };
        state.modules.insert(record.slug, module.clone());
        Ok(module)
    }

    async fn update_module_status(&self, slug: &str, status: ModuleStatus) -> CmsResult<ModuleRecord> {
        self.check_available()?;
        let mut state = self.state.write();

        let module = state
            .modules
            .get_mut(slug)
            .ok_or_else(|| CmsError::not_found(format!("module record '{slug}'")))?;
        module.status = status;
        module.updated_at = Utc::now();
        Ok(module.clone())
    }

    async fn delete_module(&self, slug: &str) -> CmsResult<bool> {
        self.check_available()?;
        Ok(self.state.write().modules.remove(slug).is_some())
    }
}

#[async_trait]
impl SchemaStore for InMemoryStore {
    async fn table_exists(&self, table: &str) -> CmsResult<bool> {
        self.check_available()?;
        Ok(self.state.read().tables.contains_key(table))
    }

    async fn column_exists(&self, table: &str, column: &str) -> CmsResult<bool> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .tables
            .get(table)
            .map(|t| t.has_column(column))
            .unwrap_or(false))
    }

    async fn create_table(&self, table: &TableDefinition) -> CmsResult<()> {
        self.check_available()?;
        table.validate()?;
        let mut state = self.state.write();

        if state.tables.contains_key(&table.name) {
            return Err(CmsError::conflict(format!(
                "relation \"{}\" already exists",
                table.name
            )));
        }
        state.tables.insert(table.name.clone(), table.clone());
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> CmsResult<()> {
        self.check_available()?;
        self.state
            .write()
            .tables
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| CmsError::not_found(format!("table \"{table}\"")))
    }

    async fn add_column(&self, table: &str, column: &ColumnDefinition) -> CmsResult<()> {
        self.check_available()?;
        let mut state = self.state.write();

        let definition = state
            .tables
            .get_mut(table)
            .ok_or_else(|| CmsError::not_found(format!("table \"{table}\"")))?;
        if definition.has_column(&column.name) {
            return Err(CmsError::conflict(format!(
                "column \"{}\" of relation \"{table}\" already exists",
                column.name
            )));
        }
        definition.columns.push(column.clone());
        Ok(())
    }

    async fn drop_column(&self, table: &str, column: &str) -> CmsResult<()> {
        self.check_available()?;
        let mut state = self.state.write();

        let definition = state
            .tables
            .get_mut(table)
            .ok_or_else(|| CmsError::not_found(format!("table \"{table}\"")))?;
        let before = definition.columns.len();
        definition.columns.retain(|c| c.name != column);
        if definition.columns.len() == before {
            return Err(CmsError::not_found(format!(
                "column \"{column}\" of relation \"{table}\""
            )));
        }
        Ok(())
    }

    async fn execute_sql(&self, _sql: &str) -> CmsResult<()> {
        self.check_available()?;
        Err(CmsError::storage(
            "raw SQL is not supported by the in-memory store",
        ))
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn insert_content_type(&self, content_type: &NewContentType) -> CmsResult<ContentType> {
        self.check_available()?;
        let slug = content_type
            .slug
            .clone()
            .unwrap_or_else(|| content_type.name.clone());
        let mut state = self.state.write();

        if state
            .content_types
            .values()
            .any(|ct| ct.name == content_type.name || ct.slug == slug)
        {
            return Err(CmsError::conflict(format!(
                "content type '{}' (slug '{slug}') already exists",
                content_type.name
            )));
        }

        let now = Utc::now();
        let created = ContentType {
            id: next_id(&mut state.next_content_type_id),
            name: content_type.name.clone(),
            label: content_type.label.clone(),
            slug,
            description: content_type.description.clone(),
            is_active: content_type.is_active,
            menu_position: content_type.menu_position,
            icon: content_type.icon.clone(),
            created_at: now,
            updated_at: now,
        };
        state.content_types.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_content_type(&self, id: i64) -> CmsResult<Option<ContentType>> {
        self.check_available()?;
        Ok(self.state.read().content_types.get(&id).cloned())
    }

    async fn find_content_type_by_slug(&self, slug: &str) -> CmsResult<Option<ContentType>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .content_types
            .values()
            .find(|ct| ct.slug == slug)
            .cloned())
    }

    async fn list_content_types(&self) -> CmsResult<Vec<ContentType>> {
        self.check_available()?;
        let mut types: Vec<ContentType> =
            self.state.read().content_types.values().cloned().collect();
        types.sort_by(|a, b| {
            a.menu_position
                .cmp(&b.menu_position)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(types)
    }

    async fn delete_content_type(&self, id: i64) -> CmsResult<bool> {
        self.check_available()?;
        let mut state = self.state.write();
        let removed = state.content_types.remove(&id).is_some();
        if removed {
            state.fields.retain(|_, f| f.content_type_id != id);
        }
        Ok(removed)
    }

    async fn insert_field(
        &self,
        content_type_id: i64,
        field: &NewContentTypeField,
    ) -> CmsResult<ContentTypeField> {
        self.check_available()?;
        let mut state = self.state.write();

        if !state.content_types.contains_key(&content_type_id) {
            return Err(CmsError::not_found(format!("content type {content_type_id}")));
        }
        if state
            .fields
            .values()
            .any(|f| f.content_type_id == content_type_id && f.name == field.name)
        {
            return Err(CmsError::conflict(format!(
                "field '{}' already exists on content type {content_type_id}",
                field.name
            )));
        }

        let now = Utc::now();
        let created = ContentTypeField {
            id: next_id(&mut state.next_field_id),
            content_type_id,
            name: field.name.clone(),
            label: field.label.clone().unwrap_or_else(|| field.name.clone()),
            field_type: field.field_type,
            is_required: field.is_required,
            options: field
                .options
                .clone()
                .unwrap_or_else(|| field.field_type.default_options()),
            validation: field
                .validation
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default())),
            order: field.order.unwrap_or(0),
            created_at: now,
            updated_at: now,
        };
        state.fields.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_field(&self, id: i64) -> CmsResult<Option<ContentTypeField>> {
        self.check_available()?;
        Ok(self.state.read().fields.get(&id).cloned())
    }

    async fn find_field_by_name(
        &self,
        content_type_id: i64,
        name: &str,
    ) -> CmsResult<Option<ContentTypeField>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .fields
            .values()
            .find(|f| f.content_type_id == content_type_id && f.name == name)
            .cloned())
    }

    async fn list_fields(&self, content_type_id: i64) -> CmsResult<Vec<ContentTypeField>> {
        self.check_available()?;
        let mut fields: Vec<ContentTypeField> = self
            .state
            .read()
            .fields
            .values()
            .filter(|f| f.content_type_id == content_type_id)
            .cloned()
            .collect();
        fields.sort_by_key(|f| (f.order, f.id));
        Ok(fields)
    }

    async fn update_field(&self, id: i64, update: &FieldUpdate) -> CmsResult<ContentTypeField> {
        self.check_available()?;
        let mut state = self.state.write();

        let field = state
            .fields
            .get_mut(&id)
            .ok_or_else(|| CmsError::not_found(format!("field {id}")))?;
        if let Some(label) = &update.label {
            field.label = label.clone();
        }
        if let Some(field_type) = update.field_type {
            field.field_type = field_type;
        }
        if let Some(is_required) = update.is_required {
            field.is_required = is_required;
        }
        if let Some(options) = &update.options {
            field.options = options.clone();
        }
        if let Some(validation) = &update.validation {
            field.validation = validation.clone();
        }
        if let Some(order) = update.order {
            field.order = order;
        }
        field.updated_at = Utc::now();
        Ok(field.clone())
    }

    async fn delete_field(&self, id: i64) -> CmsResult<bool> {
        self.check_available()?;
        Ok(self.state.write().fields.remove(&id).is_some())
    }

    async fn max_field_order(&self, content_type_id: i64) -> CmsResult<Option<i32>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .fields
            .values()
            .filter(|f| f.content_type_id == content_type_id)
            .map(|f| f.order)
            .max())
    }

    async fn insert_content(&self, content: &NewContent) -> CmsResult<ContentRecord> {
        self.check_available()?;
        let mut state = self.state.write();

        if !state.content_types.contains_key(&content.content_type_id) {
            return Err(CmsError::not_found(format!(
                "content type {}",
                content.content_type_id
            )));
        }

        let now = Utc::now();
        let record = ContentRecord {
            id: next_id(&mut state.next_content_id),
            content_type_id: content.content_type_id,
            title: content.title.clone(),
            slug: content.slug.clone(),
            status: content.status.clone(),
            author_id: content.author_id,
            fields: content.fields.clone(),
            created_at: now,
            updated_at: now,
        };
        state.content.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_content(&self, id: i64, content: &NewContent) -> CmsResult<ContentRecord> {
        self.check_available()?;
        let mut state = self.state.write();

        let record = state
            .content
            .get_mut(&id)
            .ok_or_else(|| CmsError::not_found(format!("content {id}")))?;
        record.title = content.title.clone();
        record.slug = content.slug.clone();
        record.status = content.status.clone();
        record.author_id = content.author_id;
        record.fields = content.fields.clone();
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn find_content(&self, id: i64) -> CmsResult<Option<ContentRecord>> {
        self.check_available()?;
        Ok(self.state.read().content.get(&id).cloned())
    }

    async fn count_content_for_type(&self, content_type_id: i64) -> CmsResult<i64> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .content
            .values()
            .filter(|c| c.content_type_id == content_type_id)
            .count() as i64)
    }

    async fn delete_content(&self, id: i64) -> CmsResult<bool> {
        self.check_available()?;
        Ok(self.state.write().content.remove(&id).is_some())
    }
}
