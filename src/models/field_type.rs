use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Closed catalog of content-type field kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Number,
    Select,
    Checkbox,
    Radio,
    Date,
    Image,
    File,
    Wysiwyg,
}

impl FieldType {
    pub const ALL: [FieldType; 10] = [
        Self::Text,
        Self::Textarea,
        Self::Number,
        Self::Select,
        Self::Checkbox,
        Self::Radio,
        Self::Date,
        Self::Image,
        Self::File,
        Self::Wysiwyg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Number => "number",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Date => "date",
            Self::Image => "image",
            Self::File => "file",
            Self::Wysiwyg => "wysiwyg",
        }
    }

    /// Options a field of this type starts with when none are given
    pub fn default_options(&self) -> Value {
        match self {
            Self::Text => json!({"placeholder": "", "max_length": 255}),
            Self::Textarea => json!({"placeholder": "", "rows": 5}),
            Self::Number => json!({"min": null, "max": null, "step": 1}),
            Self::Select => json!({"choices": [], "multiple": false}),
            Self::Checkbox => json!({"default": false}),
            Self::Radio => json!({"choices": []}),
            Self::Date => json!({"format": "%Y-%m-%d"}),
            Self::Image => json!({"allowed_extensions": ["jpg", "jpeg", "png", "gif", "webp"], "max_size_kb": 2048}),
            Self::File => json!({"allowed_extensions": [], "max_size_kb": 10240}),
            Self::Wysiwyg => json!({"toolbar": "full"}),
        }
    }

    /// Whether the type restricts values to `options.choices`
    pub fn has_choices(&self) -> bool {
        matches!(self, Self::Select | Self::Radio)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|field_type| field_type.as_str() == s)
            .ok_or_else(|| format!("Invalid field type: {s}"))
    }
}
