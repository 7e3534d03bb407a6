//! Persisted records for modules, content types, their fields and content.

pub mod content;
pub mod content_type;
pub mod field_type;
pub mod module_record;

// Re-export core models for easy access
pub use content::{is_standard_column, ContentRecord, NewContent, STANDARD_COLUMNS};
pub use content_type::{ContentType, ContentTypeField, FieldUpdate, NewContentType, NewContentTypeField};
pub use field_type::FieldType;
pub use module_record::{ModuleRecord, ModuleStatus, NewModuleRecord};
