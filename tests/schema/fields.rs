use crate::common::*;
use cms_core::schema::{FieldType, FieldUpdate, NewContentType, NewContentTypeField};
use cms_core::ErrorKind;
use serde_json::json;

async fn article_type(cms: &TestCms) -> i64 {
    cms.context
        .schema
        .create_content_type(NewContentType::new("article", "Article"))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_field_names_are_unique_per_type() {
    let cms = TestCms::new();
    let article = article_type(&cms).await;
    let page = cms
        .context
        .schema
        .create_content_type(NewContentType::new("page", "Page"))
        .await
        .unwrap()
        .id;
    let schema = &cms.context.schema;

    schema
        .create_field(article, NewContentTypeField::new("subtitle", FieldType::Text))
        .await
        .unwrap();
    let err = schema
        .create_field(article, NewContentTypeField::new("subtitle", FieldType::Textarea))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let fields = schema.get_fields_for_type(article).await.unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].field_type, FieldType::Text);

    // the same name on another type is fine
    schema
        .create_field(page, NewContentTypeField::new("subtitle", FieldType::Text))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fields_sorted_by_order_and_appended_after_max() {
    let cms = TestCms::new();
    let article = article_type(&cms).await;
    let schema = &cms.context.schema;

    let first = schema
        .create_field(article, NewContentTypeField::new("intro", FieldType::Textarea))
        .await
        .unwrap();
    assert_eq!(first.order, 1);

    schema
        .create_field(article, NewContentTypeField::new("gallery", FieldType::Image).order(10))
        .await
        .unwrap();
    schema
        .create_field(article, NewContentTypeField::new("byline", FieldType::Text).order(3))
        .await
        .unwrap();
    let appended = schema
        .create_field(article, NewContentTypeField::new("footnote", FieldType::Text))
        .await
        .unwrap();
    assert_eq!(appended.order, 11);

    let fields = schema.get_fields_for_type(article).await.unwrap();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["intro", "byline", "gallery", "footnote"]);
    let orders: Vec<i32> = fields.iter().map(|f| f.order).collect();
    assert!(orders.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn test_update_moves_field_and_delete_removes_it() {
    let cms = TestCms::new();
    let article = article_type(&cms).await;
    let schema = &cms.context.schema;

    let intro = schema
        .create_field(article, NewContentTypeField::new("intro", FieldType::Text))
        .await
        .unwrap();
    let body = schema
        .create_field(article, NewContentTypeField::new("body", FieldType::Wysiwyg))
        .await
        .unwrap();

    let moved = schema
        .update_field(
            intro.id,
            FieldUpdate {
                order: Some(body.order + 1),
                label: Some("Introduction".to_string()),
                is_required: Some(true),
                ..FieldUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.label, "Introduction");
    assert!(moved.is_required);

    let names: Vec<String> = schema
        .get_fields_for_type(article)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["body", "intro"]);

    schema.delete_field(body.id).await.unwrap();
    assert!(schema.get_field(body.id).await.unwrap_err().is_not_found());
    assert_eq!(schema.get_fields_for_type(article).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_field_definitions_are_validated() {
    let cms = TestCms::new();
    let article = article_type(&cms).await;
    let schema = &cms.context.schema;

    for name in ["Subtitle", "2nd_line", "has space", "status"] {
        let err = schema
            .create_field(article, NewContentTypeField::new(name, FieldType::Text))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{name}");
    }

    let err = schema
        .create_field(
            article,
            NewContentTypeField::new("colour", FieldType::Select).options(json!(["red"])),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = schema
        .create_field(999, NewContentTypeField::new("colour", FieldType::Select))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(schema.get_fields_for_type(article).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_content_type_lifecycle() {
    let cms = TestCms::new();
    let schema = &cms.context.schema;

    let news = schema
        .create_content_type(NewContentType::new("news_item", "News item"))
        .await
        .unwrap();
    assert_eq!(news.slug, "news-item");

    let duplicate = schema
        .create_content_type(NewContentType::new("news_item", "Another"))
        .await
        .unwrap_err();
    assert!(duplicate.is_conflict());

    let err = schema
        .create_content_type(NewContentType::new("event", " "))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    schema
        .create_field(news.id, NewContentTypeField::new("lede", FieldType::Text))
        .await
        .unwrap();
    assert_eq!(schema.list_content_types().await.len(), 1);

    schema.delete_content_type(news.id).await.unwrap();
    assert!(schema.list_content_types().await.is_empty());
    assert!(schema.get_content_type(news.id).await.unwrap_err().is_not_found());
}
