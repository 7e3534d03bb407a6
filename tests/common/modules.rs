//! Module implementations used to drive the lifecycle manager in tests

use async_trait::async_trait;
use cms_core::database::{
    ColumnDefinition, ColumnType, MigrationKey, MigrationUnit, SchemaStore, TableDefinition,
    TableMigration,
};
use cms_core::events::{handler, HandlerResult};
use cms_core::modules::{CmsModule, ModuleContext, ModuleFactoryRegistry};
use cms_core::{CmsError, CmsResult};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

/// Custom event every [`TestModule`] answers with its module id
pub const PING: &str = "test.ping";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Init,
    Install,
    Activate,
    Deactivate,
    Uninstall,
}

/// Shared log of hook calls and migration steps
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Configurable module: subscribes to [`PING`] on init, runs the given
/// migrations and can be told to fail one hook
#[derive(Clone, Default)]
pub struct TestModule {
    pub migrations: Vec<Arc<dyn MigrationUnit>>,
    pub failing_hook: Option<Hook>,
    pub log: CallLog,
}

impl TestModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_migration(mut self, unit: impl MigrationUnit + 'static) -> Self {
        self.migrations.push(Arc::new(unit));
        self
    }

    /// Migration creating table `name`
    pub fn with_table(self, key: &str, name: &str) -> Self {
        self.with_migration(TableMigration::new(key, simple_table(name)))
    }

    pub fn failing(mut self, hook: Hook) -> Self {
        self.failing_hook = Some(hook);
        self
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Register this module as the implementation of `id`
    pub fn register(self, factories: &ModuleFactoryRegistry, id: &str) {
        factories.register(id, move |_descriptor| {
            Ok(Arc::new(self.clone()) as Arc<dyn CmsModule>)
        });
    }

    fn run(&self, hook: Hook, ctx: &ModuleContext) -> CmsResult<()> {
        self.log
            .lock()
            .push(format!("{hook:?}:{}", ctx.module_id()).to_lowercase());
        if self.failing_hook == Some(hook) {
            return Err(CmsError::Internal(format!("{hook:?} hook failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl CmsModule for TestModule {
    async fn init(&self, ctx: &ModuleContext) -> CmsResult<()> {
        let module_id = ctx.module_id().to_string();
        ctx.subscribe(
            PING,
            handler(move |_event| {
                let module_id = module_id.clone();
                async move { Ok(HandlerResult::Value(json!(module_id))) }
            }),
        );
        self.run(Hook::Init, ctx)
    }

    async fn install(&self, ctx: &ModuleContext) -> CmsResult<()> {
        self.run(Hook::Install, ctx)
    }

    async fn activate(&self, ctx: &ModuleContext) -> CmsResult<()> {
        self.run(Hook::Activate, ctx)
    }

    async fn deactivate(&self, ctx: &ModuleContext) -> CmsResult<()> {
        self.run(Hook::Deactivate, ctx)
    }

    async fn uninstall(&self, ctx: &ModuleContext) -> CmsResult<()> {
        self.run(Hook::Uninstall, ctx)
    }

    fn migrations(&self) -> Vec<Arc<dyn MigrationUnit>> {
        self.migrations.clone()
    }
}

pub fn simple_table(name: &str) -> TableDefinition {
    TableDefinition::new(name)
        .column(ColumnDefinition::new("label", ColumnType::Text))
        .timestamps()
}

/// Records `up:<key>` / `down:<key>` and optionally fails `up`
pub struct RecordingMigration {
    key: MigrationKey,
    log: CallLog,
    fail_up: bool,
}

impl RecordingMigration {
    pub fn new(key: &str, log: &CallLog) -> Self {
        Self {
            key: MigrationKey::from(key),
            log: log.clone(),
            fail_up: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_up = true;
        self
    }
}

#[async_trait]
impl MigrationUnit for RecordingMigration {
    fn key(&self) -> &MigrationKey {
        &self.key
    }

    async fn up(&self, _schema: &dyn SchemaStore) -> CmsResult<()> {
        if self.fail_up {
            return Err(CmsError::storage(format!("{} exploded", self.key)));
        }
        self.log.lock().push(format!("up:{}", self.key));
        Ok(())
    }

    async fn down(&self, _schema: &dyn SchemaStore) -> CmsResult<()> {
        self.log.lock().push(format!("down:{}", self.key));
        Ok(())
    }
}
