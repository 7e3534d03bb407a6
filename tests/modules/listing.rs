use crate::common::*;
use cms_core::database::ModuleStore;
use cms_core::modules::{ModuleFactoryRegistry, ModuleStatus};
use std::fs;

#[tokio::test]
async fn test_list_merges_available_and_installed() {
    let factories = ModuleFactoryRegistry::new();
    TestModule::new().register(&factories, "blog");
    let cms = TestCms::with_factories(factories);
    cms.add_module("blog", &[]);
    cms.add_module("shop", &["blog"]);
    let wiki = cms.add_module("wiki", &[]);

    cms.install_and_activate("blog").await;
    assert!(cms.context.modules.install("wiki").await.success);
    // wiki's directory disappears after install
    fs::remove_dir_all(wiki).unwrap();
    cms.context.discovery.scan();

    let listing = cms.context.modules.list().await;
    let ids: Vec<&str> = listing.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["blog", "shop", "wiki"]);

    let blog = &listing[0];
    assert!(blog.installed && blog.available && blog.loaded);
    assert_eq!(blog.status, Some(ModuleStatus::Active));

    let shop = &listing[1];
    assert!(!shop.installed && shop.available);
    assert_eq!(shop.status, None);
    assert_eq!(shop.requires, vec!["blog"]);

    let wiki = &listing[2];
    assert!(wiki.installed && !wiki.available);
    assert_eq!(wiki.status, Some(ModuleStatus::Inactive));
    assert_eq!(wiki.name, "Wiki module");
}

#[tokio::test]
async fn test_get_and_status() {
    let cms = TestCms::new();
    cms.add_module("blog", &[]);
    cms.add_module("shop", &[]);
    cms.install_and_activate("blog").await;
    assert!(cms.context.modules.install("shop").await.success);

    let blog = cms.context.modules.get("blog").await.unwrap();
    assert_eq!(blog.version, "1.0.0");
    assert_eq!(blog.available_version.as_deref(), Some("1.0.0"));
    assert!(cms.context.modules.get("ghost").await.is_none());

    let status = cms.context.modules.status().await;
    assert_eq!(status.get("blog"), Some(&ModuleStatus::Active));
    assert_eq!(status.get("shop"), Some(&ModuleStatus::Inactive));
    assert_eq!(status.len(), 2);
}

#[tokio::test]
async fn test_listing_survives_storage_outage() {
    let cms = TestCms::new();
    cms.add_module("blog", &[]);
    assert!(cms.context.modules.install("blog").await.success);

    cms.store.simulate_outage(true);
    let listing = cms.context.modules.list().await;
    assert_eq!(listing.len(), 1);
    assert!(!listing[0].installed);
    assert!(cms.context.modules.status().await.is_empty());

    cms.store.simulate_outage(false);
    assert_eq!(cms.store.list_modules().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_storage_outage_fails_operations() {
    let cms = TestCms::new();
    cms.add_module("blog", &[]);
    cms.store.simulate_outage(true);

    let result = cms.context.modules.install("blog").await;
    assert!(!result.success);
    assert_eq!(result.http_status(), 500);
}
