#![allow(dead_code)]

pub mod modules;
pub mod strategies;

pub use modules::*;

use cms_core::config::{CmsConfig, ConfigManager};
use cms_core::database::{InMemoryStore, Store};
use cms_core::modules::ModuleFactoryRegistry;
use cms_core::CmsContext;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A CMS wired over an in-memory store, scanning a temporary module directory
pub struct TestCms {
    pub context: CmsContext,
    pub store: Arc<InMemoryStore>,
    pub modules_dir: TempDir,
}

impl TestCms {
    pub fn new() -> Self {
        Self::with_factories(ModuleFactoryRegistry::new())
    }

    pub fn with_factories(factories: ModuleFactoryRegistry) -> Self {
        let modules_dir = TempDir::new().expect("temp module dir");
        Self::build(modules_dir, test_config, factories)
    }

    pub fn with_config(
        factories: ModuleFactoryRegistry,
        configure: impl FnOnce(&mut CmsConfig),
    ) -> Self {
        let modules_dir = TempDir::new().expect("temp module dir");
        Self::build(
            modules_dir,
            |dir| {
                let mut config = test_config(dir);
                configure(&mut config);
                config
            },
            factories,
        )
    }

    fn build(
        modules_dir: TempDir,
        config: impl FnOnce(&Path) -> CmsConfig,
        factories: ModuleFactoryRegistry,
    ) -> Self {
        let config_manager =
            ConfigManager::from_config(config(modules_dir.path())).expect("valid test config");
        let store = Arc::new(InMemoryStore::new());
        let shared: Arc<dyn Store> = store.clone();
        let context = CmsContext::from_store(config_manager, shared, factories);

        Self {
            context,
            store,
            modules_dir,
        }
    }

    /// Write a manifest for `id` into the module directory
    pub fn add_module(&self, id: &str, requires: &[&str]) -> PathBuf {
        write_module(self.modules_dir.path(), id, requires)
    }

    pub async fn install_and_activate(&self, id: &str) {
        let installed = self.context.modules.install(id).await;
        assert!(installed.success, "install {id}: {}", installed.message());
        let activated = self.context.modules.activate(id).await;
        assert!(activated.success, "activate {id}: {}", activated.message());
    }
}

pub fn test_config(modules_dir: &Path) -> CmsConfig {
    let mut config = CmsConfig::default();
    config.environment = "test".to_string();
    config.modules.search_paths = vec![modules_dir.to_path_buf()];
    config
}

/// `blog` → `Blog module`
pub fn module_name(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => format!("{}{} module", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

pub fn write_module(root: &Path, id: &str, requires: &[&str]) -> PathBuf {
    let dir = root.join(id);
    fs::create_dir_all(&dir).expect("module dir");
    let manifest = format!(
        "id: {id}\nname: {}\nversion: 1.0.0\nrequires: [{}]\n",
        module_name(id),
        requires.join(", ")
    );
    fs::write(dir.join("module.yaml"), manifest).expect("module manifest");
    dir
}
