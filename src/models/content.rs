use crate::error::{CmsError, CmsResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Columns every content row has regardless of its content type. Any other
/// key in saved data is a content-type field value.
pub const STANDARD_COLUMNS: [&str; 8] = [
    "id",
    "content_type_id",
    "title",
    "slug",
    "status",
    "author_id",
    "created_at",
    "updated_at",
];

pub fn is_standard_column(key: &str) -> bool {
    STANDARD_COLUMNS.contains(&key)
}

/// ContentRecord is one piece of content of some content type
/// Maps to `content` table; field values live in its `fields` JSON column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: i64,
    pub content_type_id: i64,
    pub title: String,
    pub slug: Option<String>,
    pub status: String,
    pub author_id: Option<i64>,
    pub fields: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    /// Field value by name
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Flattened view: standard columns plus field values
    pub fn to_data(&self) -> Map<String, Value> {
        let mut data = self.fields.clone();
        data.insert("id".to_string(), Value::from(self.id));
        data.insert("content_type_id".to_string(), Value::from(self.content_type_id));
        data.insert("title".to_string(), Value::from(self.title.clone()));
        data.insert(
            "slug".to_string(),
            self.slug.clone().map(Value::from).unwrap_or(Value::Null),
        );
        data.insert("status".to_string(), Value::from(self.status.clone()));
        data.insert(
            "author_id".to_string(),
            self.author_id.map(Value::from).unwrap_or(Value::Null),
        );
        data.insert("created_at".to_string(), Value::from(self.created_at.to_rfc3339()));
        data.insert("updated_at".to_string(), Value::from(self.updated_at.to_rfc3339()));
        data
    }
}

/// Content row values ready to persist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContent {
    pub content_type_id: i64,
    pub title: String,
    pub slug: Option<String>,
    pub status: String,
    pub author_id: Option<i64>,
    pub fields: Map<String, Value>,
}

impl NewContent {
    pub const DEFAULT_STATUS: &'static str = "draft";

    /// Split flat record data into standard columns and field values.
    ///
    /// `title`, `slug` and `status` must be strings when present. `author_id`
    /// accepts an integer or a numeric string.
    pub fn from_data(content_type_id: i64, data: &Map<String, Value>) -> CmsResult<Self> {
        let mut fields = Map::new();
        for (key, value) in data {
            if !is_standard_column(key) {
                fields.insert(key.clone(), value.clone());
            }
        }

        Ok(Self {
            content_type_id,
            title: string_column(data, "title")?.unwrap_or_default(),
            slug: string_column(data, "slug")?,
            status: string_column(data, "status")?
                .unwrap_or_else(|| Self::DEFAULT_STATUS.to_string()),
            author_id: author_id(data)?,
            fields,
        })
    }
}

fn string_column(data: &Map<String, Value>, column: &str) -> CmsResult<Option<String>> {
    match data.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(CmsError::validation(format!(
            "'{column}' must be a string, got {other}"
        ))),
    }
}

fn author_id(data: &Map<String, Value>) -> CmsResult<Option<i64>> {
    let value = match data.get("author_id") {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let parsed = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) if text.trim().is_empty() => return Ok(None),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.map(Some).ok_or_else(|| {
        CmsError::validation(format!("'author_id' must be an integer, got {value}"))
    })
}
