use crate::common::*;
use cms_core::database::{ModuleStore, SchemaStore, TableMigration};
use cms_core::modules::ModuleFactoryRegistry;
use cms_core::ErrorKind;
use std::fs;

#[tokio::test]
async fn test_units_apply_in_order_and_revert_in_reverse() {
    let log = call_log();
    let factories = ModuleFactoryRegistry::new();
    // registered out of order on purpose
    TestModule::new()
        .with_migration(RecordingMigration::new("002_y", &log))
        .with_migration(RecordingMigration::new("001_x", &log))
        .register(&factories, "shop");
    let cms = TestCms::with_factories(factories);
    cms.add_module("shop", &[]);

    assert!(cms.context.modules.install("shop").await.success);
    assert_eq!(*log.lock(), vec!["up:001_x", "up:002_y"]);

    log.lock().clear();
    assert!(cms.context.modules.uninstall("shop").await.success);
    assert_eq!(*log.lock(), vec!["down:002_y", "down:001_x"]);
}

#[tokio::test]
async fn test_failed_unit_keeps_earlier_units_and_skips_record() {
    let log = call_log();
    let factories = ModuleFactoryRegistry::new();
    TestModule::new()
        .with_migration(TableMigration::new("001_x", simple_table("shop_products")))
        .with_migration(RecordingMigration::new("002_y", &log).failing())
        .register(&factories, "shop");
    let cms = TestCms::with_factories(factories);
    cms.add_module("shop", &[]);

    let result = cms.context.modules.install("shop").await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::Migration));
    assert!(result.message().contains("002_y"), "{}", result.message());

    assert!(cms.store.table_exists("shop_products").await.unwrap());
    assert!(cms.store.find_module("shop").await.unwrap().is_none());
}

#[tokio::test]
async fn test_sql_files_in_module_directory_are_discovered() {
    let cms = TestCms::new();
    let dir = cms.add_module("legacy", &[]);
    let migrations = dir.join("migrations");
    fs::create_dir_all(&migrations).unwrap();
    fs::write(
        migrations.join("001_create_items.up.sql"),
        "CREATE TABLE legacy_items (id BIGSERIAL PRIMARY KEY);",
    )
    .unwrap();

    // raw SQL cannot run against the in-memory store
    let result = cms.context.modules.install("legacy").await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::Migration));
    assert!(result.message().contains("001_create_items"), "{}", result.message());
    assert!(cms.store.find_module("legacy").await.unwrap().is_none());
}
