use crate::common::*;
use async_trait::async_trait;
use cms_core::events::{handler, names, Event, HandlerResult};
use cms_core::modules::{CmsModule, ModuleContext, ModuleFactoryRegistry};
use cms_core::schema::{FieldType, NewContentType, NewContentTypeField};
use cms_core::{CmsResult, ErrorKind};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

async fn page_type(cms: &TestCms) -> i64 {
    cms.context
        .schema
        .create_content_type(NewContentType::new("page", "Page"))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_unknown_key_creates_text_field() {
    let cms = TestCms::new();
    let page = page_type(&cms).await;

    let saved = cms
        .context
        .content
        .save(page, data(json!({"title": "About", "custom_note": "hello there"})))
        .await
        .unwrap();

    let fields = cms.context.schema.get_fields_for_type(page).await.unwrap();
    assert_eq!(fields.len(), 1);
    let field = &fields[0];
    assert_eq!(field.name, "custom_note");
    assert_eq!(field.label, "Custom note");
    assert_eq!(field.field_type, FieldType::Text);
    assert!(!field.is_required);

    let found = cms.context.content.find(saved.id).await.unwrap();
    assert_eq!(found.title, "About");
    assert_eq!(found.field("custom_note"), Some(&json!("hello there")));

    // a second save with the same key creates nothing new
    cms.context
        .content
        .save(page, data(json!({"title": "Contact", "custom_note": "again"})))
        .await
        .unwrap();
    assert_eq!(cms.context.schema.get_fields_for_type(page).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_key_rejected_when_auto_create_disabled() {
    let cms = TestCms::with_config(ModuleFactoryRegistry::new(), |config| {
        config.schema.allow_auto_create_fields = false;
    });
    let page = page_type(&cms).await;

    let err = cms
        .context
        .content
        .save(page, data(json!({"title": "About", "custom_note": "x"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("custom_note"));
    assert!(cms.context.schema.get_fields_for_type(page).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_keys_keep_their_spelling() {
    let cms = TestCms::new();
    let page = page_type(&cms).await;

    let saved = cms
        .context
        .content
        .save(page, data(json!({"title": "About", "customNote": "a", "note-2": "b"})))
        .await
        .unwrap();

    let fields = cms.context.schema.get_fields_for_type(page).await.unwrap();
    let labels: Vec<(&str, &str)> = fields
        .iter()
        .map(|f| (f.name.as_str(), f.label.as_str()))
        .collect();
    assert_eq!(labels.len(), 2);
    assert!(labels.contains(&("customNote", "Custom note")));
    assert!(labels.contains(&("note-2", "Note 2")));

    let found = cms.context.content.find(saved.id).await.unwrap();
    assert_eq!(found.field("customNote"), Some(&json!("a")));
    assert_eq!(found.field("note-2"), Some(&json!("b")));

    // explicit field definitions keep the strict naming rules
    let err = cms
        .context
        .schema
        .create_field(page, NewContentTypeField::new("otherNote", FieldType::Text))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_rejected_save_creates_no_fields() {
    let cms = TestCms::new();
    let page = page_type(&cms).await;
    cms.context
        .schema
        .create_field(page, NewContentTypeField::new("summary", FieldType::Textarea).required())
        .await
        .unwrap();

    let err = cms
        .context
        .content
        .save(page, data(json!({"title": "Draft", "custom_note": "x"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // malformed standard columns are rejected before any field is created
    let err = cms
        .context
        .content
        .save(
            page,
            data(json!({"title": 42, "summary": "s", "custom_note": "x"})),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let names: Vec<String> = cms
        .context
        .schema
        .get_fields_for_type(page)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["summary"]);
}

#[tokio::test]
async fn test_author_id_is_coerced_from_numeric_string() {
    let cms = TestCms::new();
    let page = page_type(&cms).await;

    let saved = cms
        .context
        .content
        .save(page, data(json!({"title": "Post", "author_id": "4"})))
        .await
        .unwrap();
    assert_eq!(saved.author_id, Some(4));

    let err = cms
        .context
        .content
        .save(page, data(json!({"title": "Post", "author_id": "four"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_records_are_validated_against_fields() {
    let cms = TestCms::new();
    let page = page_type(&cms).await;
    let schema = &cms.context.schema;
    schema
        .create_field(page, NewContentTypeField::new("summary", FieldType::Textarea).required())
        .await
        .unwrap();
    schema
        .create_field(
            page,
            NewContentTypeField::new("rating", FieldType::Number)
                .options(json!({"min": 1, "max": 5})),
        )
        .await
        .unwrap();
    schema
        .create_field(
            page,
            NewContentTypeField::new("layout", FieldType::Select)
                .options(json!({"choices": ["wide", "narrow"]})),
        )
        .await
        .unwrap();

    let err = cms
        .context
        .content
        .save(page, data(json!({"title": "Bad", "rating": 9, "layout": "tall"})))
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("'Summary' is required"), "{message}");
    assert!(message.contains("at most 5"), "{message}");
    assert!(message.contains("tall"), "{message}");

    let saved = cms
        .context
        .content
        .save(
            page,
            data(json!({"title": "Good", "summary": "s", "rating": "4", "layout": "wide"})),
        )
        .await
        .unwrap();
    assert_eq!(saved.status, "draft");
}

#[tokio::test]
async fn test_content_type_with_content_cannot_be_deleted() {
    let cms = TestCms::new();
    let page = page_type(&cms).await;
    let saved = cms
        .context
        .content
        .save(page, data(json!({"title": "Home"})))
        .await
        .unwrap();

    let err = cms.context.schema.delete_content_type(page).await.unwrap_err();
    assert!(err.is_conflict());

    cms.context.content.delete(saved.id).await.unwrap();
    cms.context.schema.delete_content_type(page).await.unwrap();
}

/// Rejects untitled content and stamps a word count onto saved pages
struct Editorial {
    saved: Arc<Mutex<Vec<(i64, Option<Value>)>>>,
}

#[async_trait]
impl CmsModule for Editorial {
    async fn init(&self, ctx: &ModuleContext) -> CmsResult<()> {
        ctx.subscribe(
            names::CONTENT_SAVING,
            handler(|event| async move {
                if let Event::ContentSaving { data, .. } = &event {
                    let untitled = data
                        .get("title")
                        .and_then(Value::as_str)
                        .map(|t| t.trim().is_empty())
                        .unwrap_or(true);
                    if untitled {
                        return Ok(HandlerResult::Stop);
                    }
                }
                Ok(HandlerResult::Continue)
            }),
        );

        let saved = self.saved.clone();
        ctx.subscribe(
            names::CONTENT_SAVED,
            handler(move |event| {
                let saved = saved.clone();
                async move {
                    if let Event::ContentSaved {
                        content_id, data, ..
                    } = event
                    {
                        saved.lock().push((content_id, data.get("body").cloned()));
                    }
                    Ok(HandlerResult::Continue)
                }
            }),
        );
        Ok(())
    }
}

#[tokio::test]
async fn test_active_module_takes_part_in_saves() {
    let saved = Arc::new(Mutex::new(Vec::new()));
    let factories = ModuleFactoryRegistry::new();
    let log = saved.clone();
    factories.register("editorial", move |_descriptor| {
        Ok(Arc::new(Editorial { saved: log.clone() }) as Arc<dyn CmsModule>)
    });
    let cms = TestCms::with_factories(factories);
    cms.add_module("editorial", &[]);
    let page = page_type(&cms).await;

    // not active yet: nothing vetoes
    cms.context
        .content
        .save(page, data(json!({"title": ""})))
        .await
        .unwrap();

    cms.install_and_activate("editorial").await;
    let err = cms
        .context
        .content
        .save(page, data(json!({"title": "  ", "body": "text"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let record = cms
        .context
        .content
        .save(page, data(json!({"title": "Welcome", "body": "text"})))
        .await
        .unwrap();
    assert_eq!(*saved.lock(), vec![(record.id, Some(json!("text")))]);

    // deactivated modules stop listening
    assert!(cms.context.modules.deactivate("editorial").await.success);
    cms.context
        .content
        .save(page, data(json!({"title": ""})))
        .await
        .unwrap();
    assert_eq!(saved.lock().len(), 1);
}
