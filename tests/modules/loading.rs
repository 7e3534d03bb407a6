use crate::common::*;
use cms_core::events::{handler, Event, HandlerResult};
use cms_core::modules::{ModuleDescriptor, ModuleFactoryRegistry};
use serde_json::{json, Value};

fn builtin_cms() -> TestCms {
    let factories = ModuleFactoryRegistry::new();
    TestModule::new().register(&factories, "core");
    TestModule::new().register(&factories, "admin");
    let cms = TestCms::with_factories(factories);
    cms.context
        .discovery
        .register_descriptor(ModuleDescriptor::new("core", "Core"));
    cms.context
        .discovery
        .register_descriptor(ModuleDescriptor::new("admin", "Admin"));
    cms
}

#[tokio::test]
async fn test_boot_falls_back_to_bootstrap_modules() {
    let cms = builtin_cms();

    let report = cms.context.boot().await;
    assert!(report.used_bootstrap);
    assert_eq!(report.loaded, vec!["core", "admin"]);
    assert!(report.failed.is_empty());
    assert_eq!(cms.context.modules.loaded_modules().await, vec!["admin", "core"]);
}

#[tokio::test]
async fn test_boot_falls_back_when_storage_is_down() {
    let cms = builtin_cms();
    cms.store.simulate_outage(true);

    let report = cms.context.modules.load_active_modules().await;
    assert!(report.used_bootstrap);
    assert_eq!(report.loaded, vec!["core", "admin"]);
}

#[tokio::test]
async fn test_boot_loads_active_modules() {
    let factories = ModuleFactoryRegistry::new();
    TestModule::new().register(&factories, "blog");
    TestModule::new().register(&factories, "shop");
    let cms = TestCms::with_factories(factories);
    cms.add_module("blog", &[]);
    cms.add_module("shop", &[]);
    cms.add_module("wiki", &[]);

    cms.install_and_activate("blog").await;
    cms.install_and_activate("wiki").await;
    assert!(cms.context.modules.install("shop").await.success);

    // simulate a fresh process
    cms.context.modules.unload_module("blog").await;

    let report = cms.context.boot().await;
    assert!(!report.used_bootstrap);
    assert_eq!(report.loaded, vec!["blog"]);
    // active, but no implementation registered
    assert_eq!(report.failed, vec!["wiki"]);
    assert!(!cms.context.modules.is_loaded("shop").await);
}

#[tokio::test]
async fn test_loaded_modules_answer_events() {
    let factories = ModuleFactoryRegistry::new();
    TestModule::new().register(&factories, "blog");
    let cms = TestCms::with_factories(factories);
    cms.add_module("blog", &[]);

    cms.context.modules.load_module("blog").await.unwrap();
    // loading twice is a no-op
    cms.context.modules.load_module("blog").await.unwrap();
    assert_eq!(cms.context.events.subscriber_count(PING), 1);

    let dispatch = cms.context.events.publish(Event::custom(PING, Value::Null)).await;
    assert_eq!(dispatch.value, Some(json!("blog")));

    assert!(cms.context.modules.unload_module("blog").await);
    assert!(!cms.context.modules.unload_module("blog").await);
    assert!(!cms.context.events.has_subscribers(PING));
}

#[tokio::test]
async fn test_load_unknown_module() {
    let factories = ModuleFactoryRegistry::new();
    TestModule::new().register(&factories, "blog");
    let cms = TestCms::with_factories(factories);
    cms.add_module("wiki", &[]);

    // no descriptor
    let err = cms.context.modules.load_module("blog").await.unwrap_err();
    assert!(err.is_not_found());

    // no implementation
    let err = cms.context.modules.load_module("wiki").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(cms.context.modules.loaded_modules().await.is_empty());
}

#[tokio::test]
async fn test_module_subscriptions_use_configured_priority() {
    let factories = ModuleFactoryRegistry::new();
    TestModule::new().register(&factories, "late");
    TestModule::new().register(&factories, "early");
    let cms = TestCms::with_config(factories, |config| config.events.default_priority = 50);
    cms.add_module("late", &[]);
    cms.add_module("early", &[]);

    cms.context.modules.load_module("late").await.unwrap();
    // a host handler at the usual default runs before module handlers
    cms.context.events.subscribe(
        PING,
        handler(|_event| async { Ok(HandlerResult::Value(json!("host"))) }),
        10,
    );
    cms.context.modules.load_module("early").await.unwrap();

    let dispatch = cms.context.events.publish(Event::custom(PING, Value::Null)).await;
    // equal priorities keep load order, so the last loaded module answers last
    assert_eq!(dispatch.value, Some(json!("early")));
    assert_eq!(dispatch.handlers_run, 3);
}
