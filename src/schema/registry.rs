//! # Schema Registry
//!
//! Content types and their typed fields. Besides explicit field management
//! the registry implements the auto-creation policy used by the content save
//! path: a key that is neither a standard column nor a known field becomes a
//! new optional `text` field before the value is stored. The policy is
//! controlled by `allow_auto_create_fields`; when disabled, unknown keys are
//! rejected instead.

use crate::database::Store;
use crate::error::{CmsError, CmsResult};
use crate::logging::log_schema_change;
use crate::models::{
    is_standard_column, ContentType, ContentTypeField, FieldType, FieldUpdate, NewContentType,
    NewContentTypeField,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct SchemaRegistry {
    store: Arc<dyn Store>,
    allow_auto_create_fields: bool,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("allow_auto_create_fields", &self.allow_auto_create_fields)
            .finish()
    }
}

impl SchemaRegistry {
    pub fn new(store: Arc<dyn Store>, allow_auto_create_fields: bool) -> Self {
        Self {
            store,
            allow_auto_create_fields,
        }
    }

    pub fn allows_auto_create_fields(&self) -> bool {
        self.allow_auto_create_fields
    }

    // ---------------------------------------------------------------------
    // Content types
    // ---------------------------------------------------------------------

    pub async fn create_content_type(&self, content_type: NewContentType) -> CmsResult<ContentType> {
        validate_field_name(&content_type.name)?;
        if content_type.label.trim().is_empty() {
            return Err(CmsError::validation(format!(
                "Content type '{}' needs a label",
                content_type.name
            )));
        }

        let slug = match &content_type.slug {
            Some(slug) => slug.clone(),
            None => slugify(&content_type.name),
        };
        validate_slug(&slug)?;

        let created = self
            .store
            .insert_content_type(&NewContentType {
                slug: Some(slug),
                ..content_type
            })
            .await?;

        log_schema_change("content_type_created", created.id, None, false);
        Ok(created)
    }

    pub async fn get_content_type(&self, id: i64) -> CmsResult<ContentType> {
        self.store
            .find_content_type(id)
            .await?
            .ok_or_else(|| CmsError::not_found(format!("Content type {id}")))
    }

    pub async fn get_content_type_by_slug(&self, slug: &str) -> CmsResult<ContentType> {
        self.store
            .find_content_type_by_slug(slug)
            .await?
            .ok_or_else(|| CmsError::not_found(format!("Content type '{slug}'")))
    }

    /// Empty on storage failure; the error is logged
    pub async fn list_content_types(&self) -> Vec<ContentType> {
        match self.store.list_content_types().await {
            Ok(types) => types,
            Err(e) => {
                error!(error = %e, "Failed to list content types");
                Vec::new()
            }
        }
    }

    /// Delete a content type and its fields. Refused while content of the
    /// type exists.
    pub async fn delete_content_type(&self, id: i64) -> CmsResult<()> {
        let content_type = self.get_content_type(id).await?;

        let count = self.store.count_content_for_type(id).await?;
        if count > 0 {
            return Err(CmsError::conflict(format!(
                "Content type '{}' still has {count} content records",
                content_type.name
            )));
        }

        self.store.delete_content_type(id).await?;
        log_schema_change("content_type_deleted", id, None, false);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Fields
    // ---------------------------------------------------------------------

    /// Add a field. `order` defaults to one past the current maximum and
    /// `options` to the field type's default shape.
    pub async fn create_field(
        &self,
        content_type_id: i64,
        field: NewContentTypeField,
    ) -> CmsResult<ContentTypeField> {
        validate_field_name(&field.name)?;
        self.insert_field(content_type_id, field).await
    }

    async fn insert_field(
        &self,
        content_type_id: i64,
        field: NewContentTypeField,
    ) -> CmsResult<ContentTypeField> {
        self.get_content_type(content_type_id).await?;
        validate_json_object("options", field.options.as_ref())?;
        validate_json_object("validation", field.validation.as_ref())?;

        if self
            .store
            .find_field_by_name(content_type_id, &field.name)
            .await?
            .is_some()
        {
            return Err(CmsError::conflict(format!(
                "Field '{}' already exists on content type {content_type_id}",
                field.name
            )));
        }

        let order = match field.order {
            Some(order) => order,
            None => self
                .store
                .max_field_order(content_type_id)
                .await?
                .map(|max| max + 1)
                .unwrap_or(1),
        };

        let resolved = NewContentTypeField {
            label: Some(field.label.clone().unwrap_or_else(|| humanize(&field.name))),
            options: Some(
                field
                    .options
                    .clone()
                    .unwrap_or_else(|| field.field_type.default_options()),
            ),
            validation: Some(
                field
                    .validation
                    .clone()
                    .unwrap_or_else(|| Value::Object(Map::new())),
            ),
            order: Some(order),
            ..field
        };

        let created = self.store.insert_field(content_type_id, &resolved).await?;
        debug!(
            content_type_id,
            field = %created.name,
            field_type = %created.field_type,
            order = created.order,
            "Created field"
        );
        Ok(created)
    }

    /// Fields ordered by `order` ascending, ties by id
    pub async fn get_fields_for_type(&self, content_type_id: i64) -> CmsResult<Vec<ContentTypeField>> {
        let mut fields = self.store.list_fields(content_type_id).await?;
        fields.sort_by_key(|f| (f.order, f.id));
        Ok(fields)
    }

    pub async fn get_field(&self, id: i64) -> CmsResult<ContentTypeField> {
        self.store
            .find_field(id)
            .await?
            .ok_or_else(|| CmsError::not_found(format!("Field {id}")))
    }

    pub async fn update_field(&self, id: i64, update: FieldUpdate) -> CmsResult<ContentTypeField> {
        self.get_field(id).await?;
        if let Some(label) = &update.label {
            if label.trim().is_empty() {
                return Err(CmsError::validation("Field label cannot be empty"));
            }
        }
        validate_json_object("options", update.options.as_ref())?;
        validate_json_object("validation", update.validation.as_ref())?;

        self.store.update_field(id, &update).await
    }

    pub async fn delete_field(&self, id: i64) -> CmsResult<()> {
        let field = self.get_field(id).await?;
        if !self.store.delete_field(id).await? {
            return Err(CmsError::not_found(format!("Field {id}")));
        }
        log_schema_change("field_deleted", field.content_type_id, Some(&field.name), false);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Record conformance
    // ---------------------------------------------------------------------

    /// Make sure every non-standard key in `data` has a field. Unknown keys
    /// become optional `text` fields when auto-creation is allowed and are
    /// rejected otherwise. Returns the fields created.
    pub async fn ensure_fields(
        &self,
        content_type_id: i64,
        data: &Map<String, Value>,
    ) -> CmsResult<Vec<ContentTypeField>> {
        let known: Vec<String> = self
            .get_fields_for_type(content_type_id)
            .await?
            .into_iter()
            .map(|f| f.name)
            .collect();

        let unknown: Vec<&String> = data
            .keys()
            .filter(|key| !is_standard_column(key) && !known.contains(key))
            .collect();
        if unknown.is_empty() {
            return Ok(Vec::new());
        }

        if !self.allow_auto_create_fields {
            let names: Vec<&str> = unknown.iter().map(|k| k.as_str()).collect();
            return Err(CmsError::validation(format!(
                "Unknown fields for content type {content_type_id}: {}",
                names.join(", ")
            )));
        }

        for key in &unknown {
            validate_content_key(key)?;
        }

        let mut created = Vec::with_capacity(unknown.len());
        for key in unknown {
            let field = NewContentTypeField::new(key.clone(), FieldType::Text).label(humanize(key));
            match self.insert_field(content_type_id, field).await {
                Ok(field) => {
                    warn!(
                        content_type_id,
                        field = %field.name,
                        "Auto-created field from unrecognized content key"
                    );
                    log_schema_change("field_auto_created", content_type_id, Some(&field.name), true);
                    created.push(field);
                }
                // created concurrently by another save
                Err(e) if e.is_conflict() => {
                    debug!(content_type_id, field = %key, "Field appeared during auto-creation");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    /// Check `data` against the type's field definitions: required fields
    /// present and non-empty, numbers numeric and within `min`/`max`,
    /// select and radio values among the configured choices.
    pub async fn validate_record(
        &self,
        content_type_id: i64,
        data: &Map<String, Value>,
    ) -> CmsResult<()> {
        let fields = self.get_fields_for_type(content_type_id).await?;

        let problems: Vec<String> = fields
            .iter()
            .filter_map(|field| check_field(field, data.get(&field.name)))
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CmsError::validation(problems.join("; ")))
        }
    }
}

fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Choices may be plain values or `{value, label}` objects
fn choice_values(options: &Value) -> Vec<Value> {
    options
        .get("choices")
        .and_then(Value::as_array)
        .map(|choices| {
            choices
                .iter()
                .map(|choice| choice.get("value").cloned().unwrap_or_else(|| choice.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn check_field(field: &ContentTypeField, value: Option<&Value>) -> Option<String> {
    if is_empty_value(value) {
        return field
            .is_required
            .then(|| format!("Field '{}' is required", field.label));
    }
    let value = value?;

    match field.field_type {
        FieldType::Number => {
            let Some(number) = as_number(value) else {
                return Some(format!("Field '{}' must be a number", field.label));
            };
            if let Some(min) = field.options.get("min").and_then(Value::as_f64) {
                if number < min {
                    return Some(format!("Field '{}' must be at least {min}", field.label));
                }
            }
            if let Some(max) = field.options.get("max").and_then(Value::as_f64) {
                if number > max {
                    return Some(format!("Field '{}' must be at most {max}", field.label));
                }
            }
            None
        }
        field_type if field_type.has_choices() => {
            let choices = choice_values(&field.options);
            if choices.is_empty() {
                return None;
            }
            let selected: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                single => vec![single],
            };
            selected
                .iter()
                .find(|v| !choices.contains(v))
                .map(|v| format!("Field '{}' does not allow the value {v}", field.label))
        }
        _ => None,
    }
}

fn validate_json_object(what: &str, value: Option<&Value>) -> CmsResult<()> {
    match value {
        None | Some(Value::Object(_)) => Ok(()),
        Some(other) => Err(CmsError::validation(format!(
            "Field {what} must be a JSON object, got {other}"
        ))),
    }
}

/// Field and content-type names: a lowercase letter followed by lowercase
/// letters, digits and underscores
pub fn validate_field_name(name: &str) -> CmsResult<()> {
    let mut chars = name.chars();
    let valid = chars.next().map(|c| c.is_ascii_lowercase()).unwrap_or(false)
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name.len() <= 64;

    if !valid {
        return Err(CmsError::validation(format!(
            "Invalid name '{name}': use lowercase letters, digits and underscores, starting with a letter"
        )));
    }
    if is_standard_column(name) {
        return Err(CmsError::validation(format!(
            "'{name}' is a standard content column and cannot be a field"
        )));
    }
    Ok(())
}

/// Keys of saved content that may become auto-created fields. Looser than
/// [`validate_field_name`]: values live in the `fields` JSON column, so any
/// printable key up to 64 characters is kept as given.
pub fn validate_content_key(key: &str) -> CmsResult<()> {
    let valid = !key.trim().is_empty()
        && key.trim() == key
        && key.chars().count() <= 64
        && !key.chars().any(char::is_control);

    if valid {
        Ok(())
    } else {
        Err(CmsError::validation(format!(
            "Invalid content key {key:?}: keys must be 1 to 64 printable characters without surrounding whitespace"
        )))
    }
}

fn validate_slug(slug: &str) -> CmsResult<()> {
    if !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(CmsError::validation(format!("Invalid slug '{slug}'")))
    }
}

fn slugify(name: &str) -> String {
    name.replace('_', "-")
}

/// `custom_note`, `custom-note` and `customNote` → `Custom note`
pub fn humanize(name: &str) -> String {
    let mut spaced = String::with_capacity(name.len());
    let mut previous: Option<char> = None;
    for c in name.chars() {
        match c {
            '_' | '-' => spaced.push(' '),
            c if c.is_uppercase()
                && previous.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) =>
            {
                spaced.push(' ');
                spaced.extend(c.to_lowercase());
            }
            c => spaced.push(c),
        }
        previous = Some(c);
    }

    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
