//! # Content Service
//!
//! The content save path. A save runs, in order:
//!
//! 1. `content.saving` on the event bus; a handler returning `Stop` vetoes it
//! 2. validation against the content type's existing fields and of the
//!    standard column values
//! 3. field auto-creation for unknown keys (or rejection, per registry policy)
//! 4. persistence
//! 5. `content.saved`
//!
//! Deletion publishes `content.deleted` after the row is gone.

use super::registry::SchemaRegistry;
use crate::database::Store;
use crate::error::{CmsError, CmsResult};
use crate::events::{Event, EventBus};
use crate::models::{ContentRecord, NewContent};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ContentService {
    store: Arc<dyn Store>,
    schema: Arc<SchemaRegistry>,
    events: Arc<EventBus>,
}

impl std::fmt::Debug for ContentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentService")
            .field("schema", &self.schema)
            .finish()
    }
}

impl ContentService {
    pub fn new(store: Arc<dyn Store>, schema: Arc<SchemaRegistry>, events: Arc<EventBus>) -> Self {
        Self {
            store,
            schema,
            events,
        }
    }

    /// Create a content record from flat data: standard columns plus field
    /// values keyed by field name
    pub async fn save(
        &self,
        content_type_id: i64,
        data: Map<String, Value>,
    ) -> CmsResult<ContentRecord> {
        self.schema.get_content_type(content_type_id).await?;
        let content = self.prepare(content_type_id, None, data).await?;

        let record = self.store.insert_content(&content).await?;
        debug!(content_type_id, content_id = record.id, "Saved content");

        self.publish_saved(&record).await;
        Ok(record)
    }

    /// Replace an existing record's values
    pub async fn update(&self, id: i64, data: Map<String, Value>) -> CmsResult<ContentRecord> {
        let existing = self.find(id).await?;
        let content = self
            .prepare(existing.content_type_id, Some(id), data)
            .await?;

        let record = self.store.update_content(id, &content).await?;
        debug!(content_type_id = record.content_type_id, content_id = id, "Updated content");

        self.publish_saved(&record).await;
        Ok(record)
    }

    pub async fn find(&self, id: i64) -> CmsResult<ContentRecord> {
        self.store
            .find_content(id)
            .await?
            .ok_or_else(|| CmsError::not_found(format!("Content {id}")))
    }

    pub async fn delete(&self, id: i64) -> CmsResult<()> {
        let existing = self.find(id).await?;
        if !self.store.delete_content(id).await? {
            return Err(CmsError::not_found(format!("Content {id}")));
        }

        self.events
            .publish(Event::ContentDeleted {
                content_type_id: existing.content_type_id,
                content_id: id,
            })
            .await;
        Ok(())
    }

    async fn prepare(
        &self,
        content_type_id: i64,
        content_id: Option<i64>,
        data: Map<String, Value>,
    ) -> CmsResult<NewContent> {
        let dispatch = self
            .events
            .publish(Event::ContentSaving {
                content_type_id,
                content_id,
                data: data.clone(),
            })
            .await;
        if dispatch.halted {
            return Err(CmsError::validation(format!(
                "Saving content of type {content_type_id} was rejected by an event handler"
            )));
        }
        if dispatch.has_errors() {
            warn!(
                content_type_id,
                errors = dispatch.errors.len(),
                "content.saving handlers failed, continuing with save"
            );
        }

        // unknown keys only ever become optional text fields, so the record
        // can be checked before any of them are created
        self.schema.validate_record(content_type_id, &data).await?;
        let content = NewContent::from_data(content_type_id, &data)?;
        self.schema.ensure_fields(content_type_id, &data).await?;

        Ok(content)
    }

    async fn publish_saved(&self, record: &ContentRecord) {
        self.events
            .publish(Event::ContentSaved {
                content_type_id: record.content_type_id,
                content_id: record.id,
                data: record.to_data(),
            })
            .await;
    }
}
