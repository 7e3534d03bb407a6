//! # Content Schema
//!
//! User-defined content types, their typed fields, and the content save path
//! that modules extend through `content.*` events.

pub mod content;
pub mod registry;

pub use content::ContentService;
pub use registry::{humanize, validate_content_key, validate_field_name, SchemaRegistry};

pub use crate::models::{
    ContentRecord, ContentType, ContentTypeField, FieldType, FieldUpdate, NewContent,
    NewContentType, NewContentTypeField,
};
