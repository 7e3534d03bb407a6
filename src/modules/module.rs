//! # Module Runtime
//!
//! A module's behaviour is supplied by a [`CmsModule`] implementation. Hosts
//! register one factory per module id in a [`ModuleFactoryRegistry`] at
//! startup; the manager instantiates modules through it when loading them or
//! running their lifecycle hooks.
//!
//! ```rust,ignore
//! struct Blog;
//!
//! #[async_trait]
//! impl CmsModule for Blog {
//!     async fn init(&self, ctx: &ModuleContext) -> CmsResult<()> {
//!         ctx.subscribe(names::CONTENT_SAVED, handler(|_event| async {
//!             Ok(HandlerResult::Continue)
//!         }));
//!         Ok(())
//!     }
//! }
//!
//! registry.register("blog", |_descriptor| Ok(Arc::new(Blog)));
//! ```

use super::descriptor::ModuleDescriptor;
use crate::database::MigrationUnit;
use crate::error::CmsResult;
use crate::events::{EventBus, EventHandler, SubscriptionId};
use crate::schema::SchemaRegistry;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Runtime behaviour of one module. Every hook except `init` is optional.
#[async_trait]
pub trait CmsModule: Send + Sync {
    /// Wire the module into the running process, typically by subscribing
    /// event handlers. Called on every load, not only on install.
    async fn init(&self, ctx: &ModuleContext) -> CmsResult<()>;

    /// Runs once after the module's migrations and record are in place
    async fn install(&self, _ctx: &ModuleContext) -> CmsResult<()> {
        Ok(())
    }

    async fn activate(&self, _ctx: &ModuleContext) -> CmsResult<()> {
        Ok(())
    }

    async fn deactivate(&self, _ctx: &ModuleContext) -> CmsResult<()> {
        Ok(())
    }

    /// Runs after the module's migrations are reverted, before its record is deleted
    async fn uninstall(&self, _ctx: &ModuleContext) -> CmsResult<()> {
        Ok(())
    }

    /// Schema changes defined in code, merged with the module's SQL files
    fn migrations(&self) -> Vec<Arc<dyn MigrationUnit>> {
        Vec::new()
    }
}

pub type ModuleFactory =
    Arc<dyn Fn(&ModuleDescriptor) -> CmsResult<Arc<dyn CmsModule>> + Send + Sync>;

/// Module id → constructor, registered explicitly by the host
#[derive(Default)]
pub struct ModuleFactoryRegistry {
    factories: DashMap<String, ModuleFactory>,
}

impl fmt::Debug for ModuleFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleFactoryRegistry")
            .field("modules", &self.module_ids())
            .finish()
    }
}

impl ModuleFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for `module_id`
    pub fn register<F>(&self, module_id: &str, factory: F)
    where
        F: Fn(&ModuleDescriptor) -> CmsResult<Arc<dyn CmsModule>> + Send + Sync + 'static,
    {
        self.factories
            .insert(module_id.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, module_id: &str) -> bool {
        self.factories.contains_key(module_id)
    }

    /// `None` when no factory is registered for the descriptor's id
    pub fn create(&self, descriptor: &ModuleDescriptor) -> Option<CmsResult<Arc<dyn CmsModule>>> {
        let factory = self.factories.get(&descriptor.id)?.value().clone();
        Some(factory(descriptor))
    }

    pub fn module_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

/// What a module sees of the running CMS
pub struct ModuleContext {
    descriptor: ModuleDescriptor,
    events: Arc<EventBus>,
    schema: Arc<SchemaRegistry>,
    default_priority: i32,
    subscriptions: Mutex<Vec<(String, SubscriptionId)>>,
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("module_id", &self.descriptor.id)
            .field("subscriptions", &*self.subscriptions.lock())
            .finish()
    }
}

impl ModuleContext {
    pub fn new(
        descriptor: ModuleDescriptor,
        events: Arc<EventBus>,
        schema: Arc<SchemaRegistry>,
        default_priority: i32,
    ) -> Self {
        Self {
            descriptor,
            events,
            schema,
            default_priority,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn module_id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    /// Value from the manifest's `config` map
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.descriptor.config.get(key)
    }

    /// Subscribe at the configured default priority
    pub fn subscribe(&self, event_name: &str, handler: EventHandler) -> SubscriptionId {
        self.subscribe_with_priority(event_name, handler, self.default_priority)
    }

    /// Subscriptions made here are owned by the module and removed when it
    /// is unloaded
    pub fn subscribe_with_priority(
        &self,
        event_name: &str,
        handler: EventHandler,
        priority: i32,
    ) -> SubscriptionId {
        let id = self
            .events
            .subscribe_as(&self.descriptor.id, event_name, handler, priority);
        self.subscriptions.lock().push((event_name.to_string(), id));
        id
    }

    pub fn subscriptions(&self) -> Vec<(String, SubscriptionId)> {
        self.subscriptions.lock().clone()
    }
}
