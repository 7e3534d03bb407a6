//! Process-wide dependencies, built once at boot and passed by reference.

use crate::config::{CmsConfig, ConfigManager};
use crate::database::{migrator, DatabaseConnection, InMemoryStore, PgStore, Store};
use crate::error::CmsResult;
use crate::events::EventBus;
use crate::modules::{LoadReport, ModuleDiscovery, ModuleFactoryRegistry, ModuleManager};
use crate::schema::{ContentService, SchemaRegistry};
use std::sync::Arc;
use tracing::info;

/// Dependency injection container for the CMS core
///
/// Holds the event bus, schema registry, content service and module manager
/// over one shared store. Tests build one per test with
/// [`CmsContext::in_memory`].
pub struct CmsContext {
    pub config_manager: Arc<ConfigManager>,
    pub store: Arc<dyn Store>,
    pub events: Arc<EventBus>,
    pub schema: Arc<SchemaRegistry>,
    pub content: Arc<ContentService>,
    pub discovery: Arc<ModuleDiscovery>,
    pub factories: Arc<ModuleFactoryRegistry>,
    pub modules: Arc<ModuleManager>,
}

impl std::fmt::Debug for CmsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmsContext")
            .field("environment", &self.config_manager.environment())
            .field("store", &"Arc<dyn Store>")
            .field("events", &self.events.stats())
            .field("schema", &self.schema)
            .field("discovery", &self.discovery)
            .field("factories", &self.factories)
            .finish()
    }
}

impl CmsContext {
    /// Load configuration, connect to Postgres and apply core migrations
    /// unless `database.skip_migrations` is set
    pub async fn new(factories: ModuleFactoryRegistry) -> CmsResult<Self> {
        info!("Initializing CmsContext with auto-detected environment configuration");
        let config_manager = ConfigManager::load()?;
        Self::from_config(config_manager, factories).await
    }

    pub async fn from_config(
        config_manager: Arc<ConfigManager>,
        factories: ModuleFactoryRegistry,
    ) -> CmsResult<Self> {
        let config = config_manager.config();
        crate::logging::init_structured_logging(&config.logging);
        let connection = DatabaseConnection::new(&config.database).await?;

        if config.database.skip_migrations {
            info!("Skipping core schema migrations");
        } else {
            migrator::run_core_migrations(connection.pool()).await?;
        }

        let store: Arc<dyn Store> = Arc::new(PgStore::new(connection.pool().clone()));
        Ok(Self::from_store(config_manager, store, factories))
    }

    /// Context over an [`InMemoryStore`] with the given configuration
    pub fn in_memory(config: CmsConfig, factories: ModuleFactoryRegistry) -> CmsResult<Self> {
        let config_manager = ConfigManager::from_config(config)?;
        Ok(Self::from_store(
            config_manager,
            Arc::new(InMemoryStore::new()),
            factories,
        ))
    }

    /// Wire every component over an existing store
    pub fn from_store(
        config_manager: Arc<ConfigManager>,
        store: Arc<dyn Store>,
        factories: ModuleFactoryRegistry,
    ) -> Self {
        let config = config_manager.config();

        let events = Arc::new(EventBus::new());
        let schema = Arc::new(SchemaRegistry::new(
            store.clone(),
            config.schema.allow_auto_create_fields,
        ));
        let content = Arc::new(ContentService::new(
            store.clone(),
            schema.clone(),
            events.clone(),
        ));
        let discovery = Arc::new(ModuleDiscovery::from_config(&config.modules));
        let factories = Arc::new(factories);
        let modules = Arc::new(
            ModuleManager::new(
                store.clone(),
                events.clone(),
                schema.clone(),
                discovery.clone(),
                factories.clone(),
            )
            .with_bootstrap_modules(config.modules.bootstrap_modules.clone())
            .with_default_priority(config.events.default_priority),
        );

        info!(
            environment = %config_manager.environment(),
            search_paths = discovery.search_paths().len(),
            modules = factories.module_ids().len(),
            "CmsContext initialized"
        );

        Self {
            config_manager,
            store,
            events,
            schema,
            content,
            discovery,
            factories,
            modules,
        }
    }

    pub fn config(&self) -> &CmsConfig {
        self.config_manager.config()
    }

    /// Boot step: load every active module into this process
    pub async fn boot(&self) -> LoadReport {
        self.modules.load_active_modules().await
    }
}
