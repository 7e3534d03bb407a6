use super::field_type::FieldType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ContentType is a user-defined entity schema
/// Maps to `content_types` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
    pub id: i64,
    /// Unique machine name
    pub name: String,
    pub label: String,
    /// Unique URL slug
    pub slug: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub menu_position: i32,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New ContentType for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContentType {
    pub name: String,
    pub label: String,
    /// Derived from `name` when absent
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub menu_position: i32,
    #[serde(default)]
    pub icon: Option<String>,
}

fn default_true() -> bool {
    true
}

impl NewContentType {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            slug: None,
            description: None,
            is_active: true,
            menu_position: 0,
            icon: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

/// ContentTypeField is one typed attribute of a content type
/// Maps to `content_type_fields` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeField {
    pub id: i64,
    pub content_type_id: i64,
    /// Unique within the owning content type
    pub name: String,
    pub label: String,
    pub field_type: FieldType,
    pub is_required: bool,
    pub options: Value,
    pub validation: Value,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New ContentTypeField for creation
///
/// `label`, `options` and `order` are resolved by the schema registry when
/// left empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContentTypeField {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub options: Option<Value>,
    #[serde(default)]
    pub validation: Option<Value>,
    #[serde(default)]
    pub order: Option<i32>,
}

impl NewContentTypeField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            label: None,
            field_type,
            is_required: false,
            options: None,
            validation: None,
            order: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }
}

/// Partial update of a field; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub label: Option<String>,
    pub field_type: Option<FieldType>,
    pub is_required: Option<bool>,
    pub options: Option<Value>,
    pub validation: Option<Value>,
    pub order: Option<i32>,
}
