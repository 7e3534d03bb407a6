use crate::common::*;
use cms_core::config::ConfigManager;
use cms_core::database::{
    ContentStore, MigrationRunner, MigrationUnit, ModuleStore, PgStore, SchemaStore, Store,
    TableMigration,
};
use cms_core::models::{ModuleStatus, NewContent, NewModuleRecord};
use cms_core::modules::ModuleFactoryRegistry;
use cms_core::schema::{FieldType, NewContentType, NewContentTypeField};
use cms_core::CmsContext;
use serde_json::{json, Map};
use sqlx::PgPool;
use std::sync::Arc;
use tempfile::TempDir;

fn new_module(slug: &str) -> NewModuleRecord {
    NewModuleRecord {
        name: slug.to_uppercase(),
        slug: slug.to_string(),
        description: Some("test module".to_string()),
        version: "1.2.3".to_string(),
        config: Map::new(),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_module_records(pool: PgPool) {
    let store = PgStore::new(pool);

    let created = store.insert_module(new_module("blog")).await.unwrap();
    assert_eq!(created.status, ModuleStatus::Inactive);

    let duplicate = store.insert_module(new_module("blog")).await.unwrap_err();
    assert!(duplicate.is_conflict());

    store
        .update_module_status("blog", ModuleStatus::Active)
        .await
        .unwrap();
    let active = store
        .list_modules_by_status(ModuleStatus::Active)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].version, "1.2.3");

    assert!(store
        .update_module_status("ghost", ModuleStatus::Active)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(store.delete_module("blog").await.unwrap());
    assert!(store.find_module("blog").await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_table_migrations(pool: PgPool) {
    let store = PgStore::new(pool);
    let units: Vec<Arc<dyn MigrationUnit>> = vec![
        Arc::new(TableMigration::new("001_albums", simple_table("gallery_albums"))),
        Arc::new(TableMigration::new("002_photos", simple_table("gallery_photos"))),
    ];
    let runner = MigrationRunner::new(&store);

    let report = runner.apply("gallery", &units).await.unwrap();
    assert_eq!(report.completed, vec!["001_albums", "002_photos"]);
    assert!(store.table_exists("gallery_photos").await.unwrap());
    assert!(store.column_exists("gallery_photos", "label").await.unwrap());

    runner.revert("gallery", &units).await.unwrap();
    assert!(!store.table_exists("gallery_albums").await.unwrap());
    assert!(!store.table_exists("gallery_photos").await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_fields_and_content(pool: PgPool) {
    let store = PgStore::new(pool);
    let page = store
        .insert_content_type(&NewContentType::new("page", "Page").with_slug("page"))
        .await
        .unwrap();

    assert_eq!(store.max_field_order(page.id).await.unwrap(), None);
    store
        .insert_field(page.id, &NewContentTypeField::new("body", FieldType::Wysiwyg).order(2))
        .await
        .unwrap();
    store
        .insert_field(page.id, &NewContentTypeField::new("intro", FieldType::Text).order(1))
        .await
        .unwrap();
    let duplicate = store
        .insert_field(page.id, &NewContentTypeField::new("intro", FieldType::Text).order(3))
        .await
        .unwrap_err();
    assert!(duplicate.is_conflict());

    let names: Vec<String> = store
        .list_fields(page.id)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["intro", "body"]);
    assert_eq!(store.max_field_order(page.id).await.unwrap(), Some(2));

    let mut data = Map::new();
    data.insert("title".to_string(), json!("Home"));
    data.insert("body".to_string(), json!("<p>Hi</p>"));
    let content = store
        .insert_content(&NewContent::from_data(page.id, &data).unwrap())
        .await
        .unwrap();
    let found = store.find_content(content.id).await.unwrap().unwrap();
    assert_eq!(found.field("body"), Some(&json!("<p>Hi</p>")));
    assert_eq!(store.count_content_for_type(page.id).await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_lifecycle_against_postgres(pool: PgPool) {
    let factories = ModuleFactoryRegistry::new();
    TestModule::new()
        .with_table("001_create_albums", "gallery_albums")
        .register(&factories, "gallery");

    let modules_dir = TempDir::new().unwrap();
    write_module(modules_dir.path(), "gallery", &[]);
    let config_manager = ConfigManager::from_config(test_config(modules_dir.path())).unwrap();
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let context = CmsContext::from_store(config_manager, store.clone(), factories);

    assert!(context.modules.install("gallery").await.success);
    assert!(context.modules.activate("gallery").await.success);
    assert!(store.table_exists("gallery_albums").await.unwrap());

    let result = context.modules.uninstall("gallery").await;
    assert!(result.success, "{}", result.message());
    assert!(!store.table_exists("gallery_albums").await.unwrap());
    assert!(store.find_module("gallery").await.unwrap().is_none());
}
