//! # Module Lifecycle Manager
//!
//! Drives each module through its lifecycle:
//!
//! ```text
//! unknown --install--> inactive --activate--> active
//!    ^                  |    ^                  |
//!    +----uninstall-----+    +---deactivate-----+
//! ```
//!
//! and wires loaded modules into the running process.
//!
//! ## Failure Handling
//!
//! Lifecycle operations never return `Err`; every failure becomes an
//! [`OperationResult`] with `success == false` and a readable message.
//!
//! - **install**: a migration failure leaves no record. A failing install
//!   hook deletes the record and reverts the migrations.
//! - **activate / deactivate**: a failing hook restores the previous status.
//! - **uninstall**: any failing step aborts before the record is deleted.
//!
//! Dependencies are enforced in both directions: install and activate need
//! every `requires` entry active, while deactivate and uninstall are refused
//! while another active module requires the target.
//!
//! The `modules.slug` unique constraint is the guard against two processes
//! installing the same module at once; a `Conflict` from the store is reported
//! as "already installed".

use super::descriptor::ModuleDescriptor;
use super::discovery::ModuleDiscovery;
use super::module::{CmsModule, ModuleContext, ModuleFactoryRegistry};
use super::result::OperationResult;
use crate::database::{discover_sql_migrations, MigrationRunner, MigrationUnit, Store};
use crate::error::{CmsError, CmsResult};
use crate::events::{Event, EventBus, DEFAULT_PRIORITY};
use crate::logging::log_module_operation;
use crate::models::{ModuleRecord, ModuleStatus, NewModuleRecord};
use crate::schema::SchemaRegistry;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// One module as the admin surface lists it: installed, available on disk,
/// or both
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleListing {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Installed version when installed, otherwise the available version
    pub version: String,
    /// Version found on disk, if the module is still available
    pub available_version: Option<String>,
    pub status: Option<ModuleStatus>,
    pub installed: bool,
    pub available: bool,
    pub loaded: bool,
    pub requires: Vec<String>,
}

/// Result of [`ModuleManager::load_active_modules`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<String>,
    /// Whether the bootstrap list was used instead of stored records
    pub used_bootstrap: bool,
}

struct LoadedModule {
    instance: Arc<dyn CmsModule>,
    context: Arc<ModuleContext>,
}

pub struct ModuleManager {
    store: Arc<dyn Store>,
    events: Arc<EventBus>,
    schema: Arc<SchemaRegistry>,
    discovery: Arc<ModuleDiscovery>,
    factories: Arc<ModuleFactoryRegistry>,
    bootstrap_modules: Vec<String>,
    default_priority: i32,
    loaded: RwLock<HashMap<String, LoadedModule>>,
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager")
            .field("discovery", &self.discovery)
            .field("factories", &self.factories)
            .field("bootstrap_modules", &self.bootstrap_modules)
            .finish()
    }
}

impl ModuleManager {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<EventBus>,
        schema: Arc<SchemaRegistry>,
        discovery: Arc<ModuleDiscovery>,
        factories: Arc<ModuleFactoryRegistry>,
    ) -> Self {
        Self {
            store,
            events,
            schema,
            discovery,
            factories,
            bootstrap_modules: vec!["core".to_string(), "admin".to_string()],
            default_priority: DEFAULT_PRIORITY,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    /// Modules loaded at boot when no active records can be read
    pub fn with_bootstrap_modules(mut self, modules: Vec<String>) -> Self {
        self.bootstrap_modules = modules;
        self
    }

    /// Priority for subscriptions modules make without one
    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn discovery(&self) -> &Arc<ModuleDiscovery> {
        &self.discovery
    }

    pub fn factories(&self) -> &Arc<ModuleFactoryRegistry> {
        &self.factories
    }

    // ---------------------------------------------------------------------
    // Lifecycle operations
    // ---------------------------------------------------------------------

    pub async fn install(&self, module_id: &str) -> OperationResult {
        info!(module_id = %module_id, "Installing module");
        let outcome = self.try_install(module_id).await;
        self.finish("install", module_id, outcome)
    }

    pub async fn activate(&self, module_id: &str) -> OperationResult {
        info!(module_id = %module_id, "Activating module");
        let outcome = self.try_activate(module_id).await;
        self.finish("activate", module_id, outcome)
    }

    pub async fn deactivate(&self, module_id: &str) -> OperationResult {
        info!(module_id = %module_id, "Deactivating module");
        let outcome = self.try_deactivate(module_id).await;
        self.finish("deactivate", module_id, outcome)
    }

    pub async fn uninstall(&self, module_id: &str) -> OperationResult {
        info!(module_id = %module_id, "Uninstalling module");
        let outcome = self.try_uninstall(module_id).await;
        self.finish("uninstall", module_id, outcome)
    }

    fn finish(
        &self,
        operation: &str,
        module_id: &str,
        outcome: CmsResult<OperationResult>,
    ) -> OperationResult {
        match outcome {
            Ok(result) => {
                log_module_operation(operation, module_id, true, result.message.as_deref());
                result
            }
            Err(e) => {
                let message = e.to_string();
                log_module_operation(operation, module_id, false, Some(&message));
                OperationResult::failure(&e)
            }
        }
    }

    async fn try_install(&self, module_id: &str) -> CmsResult<OperationResult> {
        let descriptor = self
            .discovery
            .find(module_id)
            .ok_or_else(|| CmsError::not_found(format!("Module '{module_id}' not found")))?;

        if self.store.find_module(module_id).await?.is_some() {
            return Err(already_installed(module_id));
        }
        self.check_dependencies(&descriptor).await?;

        let instance = self.instantiate(&descriptor).await?;
        let units = self.migration_units(&descriptor, instance.as_ref())?;
        let runner = MigrationRunner::new(self.store.schema());
        runner.apply(module_id, &units).await?;

        let record = match self
            .store
            .insert_module(NewModuleRecord {
                name: descriptor.name.clone(),
                slug: descriptor.id.clone(),
                description: descriptor.description.clone(),
                version: descriptor.version.clone(),
                config: descriptor.config.clone(),
            })
            .await
        {
            Ok(record) => record,
            // Lost a race with a concurrent install of the same module
            Err(e) if e.is_conflict() => return Err(already_installed(module_id)),
            Err(e) => {
                self.revert_quietly(module_id, &units).await;
                return Err(e);
            }
        };

        if let Some(instance) = &instance {
            let context = self.context_for(&descriptor).await;
            if let Err(e) = instance.install(&context).await {
                warn!(module_id = %module_id, error = %e, "Install hook failed, rolling back");
                if let Err(delete_error) = self.store.delete_module(module_id).await {
                    error!(module_id = %module_id, error = %delete_error, "Failed to delete module record during rollback");
                }
                self.revert_quietly(module_id, &units).await;
                return Err(e);
            }
        }

        self.events
            .publish(Event::ModuleInstalled {
                module_id: module_id.to_string(),
            })
            .await;

        Ok(
            OperationResult::ok(format!("Module '{}' installed successfully", descriptor.name))
                .with_data(json!(record)),
        )
    }

    async fn try_activate(&self, module_id: &str) -> CmsResult<OperationResult> {
        let record = self.installed_record(module_id).await?;
        if record.is_active() {
            return Ok(
                OperationResult::ok(format!("Module '{}' is already active", record.name))
                    .with_data(json!(record)),
            );
        }

        let descriptor = self.descriptor_or_record(&record);
        self.check_dependencies(&descriptor).await?;

        let updated = self
            .store
            .update_module_status(module_id, ModuleStatus::Active)
            .await?;

        if self.factories.contains(module_id) {
            if let Err(e) = self.load_module(module_id).await {
                warn!(module_id = %module_id, error = %e, "Activated module could not be loaded");
            }
        }

        let hook = match self.instantiate(&descriptor).await {
            Ok(Some(instance)) => {
                let context = self.context_for(&descriptor).await;
                instance.activate(&context).await
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = hook {
            warn!(module_id = %module_id, error = %e, "Activate hook failed, restoring status");
            self.unload_module(module_id).await;
            self.restore_status(module_id, ModuleStatus::Inactive).await;
            return Err(e);
        }

        self.events
            .publish(Event::ModuleActivated {
                module_id: module_id.to_string(),
            })
            .await;

        Ok(
            OperationResult::ok(format!("Module '{}' activated successfully", record.name))
                .with_data(json!(updated)),
        )
    }

    async fn try_deactivate(&self, module_id: &str) -> CmsResult<OperationResult> {
        let record = self.installed_record(module_id).await?;
        if !record.is_active() {
            return Ok(
                OperationResult::ok(format!("Module '{}' is already inactive", record.name))
                    .with_data(json!(record)),
            );
        }

        self.ensure_no_active_dependents("deactivate", &record).await?;

        let updated = self
            .store
            .update_module_status(module_id, ModuleStatus::Inactive)
            .await?;

        let descriptor = self.descriptor_or_record(&record);
        let hook = match self.instantiate(&descriptor).await {
            Ok(Some(instance)) => {
                let context = self.context_for(&descriptor).await;
                instance.deactivate(&context).await
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = hook {
            warn!(module_id = %module_id, error = %e, "Deactivate hook failed, restoring status");
            self.restore_status(module_id, ModuleStatus::Active).await;
            return Err(e);
        }

        self.unload_module(module_id).await;

        self.events
            .publish(Event::ModuleDeactivated {
                module_id: module_id.to_string(),
            })
            .await;

        Ok(
            OperationResult::ok(format!("Module '{}' deactivated successfully", record.name))
                .with_data(json!(updated)),
        )
    }

    async fn try_uninstall(&self, module_id: &str) -> CmsResult<OperationResult> {
        let record = self.installed_record(module_id).await?;
        // also covers an inactive module still required by an active one
        self.ensure_no_active_dependents("uninstall", &record).await?;
        if record.is_active() {
            self.try_deactivate(module_id).await?;
        }

        let descriptor = self.descriptor_or_record(&record);
        let instance = self.instantiate(&descriptor).await?;
        let units = self.migration_units(&descriptor, instance.as_ref())?;
        MigrationRunner::new(self.store.schema())
            .revert(module_id, &units)
            .await?;

        if let Some(instance) = &instance {
            let context = self.context_for(&descriptor).await;
            instance.uninstall(&context).await?;
        }

        self.unload_module(module_id).await;
        self.store.delete_module(module_id).await?;

        self.events
            .publish(Event::ModuleUninstalled {
                module_id: module_id.to_string(),
            })
            .await;

        Ok(OperationResult::ok(format!(
            "Module '{}' uninstalled successfully",
            record.name
        )))
    }

    // ---------------------------------------------------------------------
    // Runtime loading
    // ---------------------------------------------------------------------

    /// Instantiate the module and run its `init`. Loading an already loaded
    /// module is a no-op.
    pub async fn load_module(&self, module_id: &str) -> CmsResult<()> {
        if self.is_loaded(module_id).await {
            debug!(module_id = %module_id, "Module already loaded");
            return Ok(());
        }

        let descriptor = self
            .discovery
            .find(module_id)
            .ok_or_else(|| CmsError::not_found(format!("Module '{module_id}' not found")))?;
        let instance = self
            .factories
            .create(&descriptor)
            .ok_or_else(|| {
                CmsError::not_found(format!(
                    "No implementation registered for module '{module_id}'"
                ))
            })??;

        let context = Arc::new(self.new_context(descriptor));
        if let Err(e) = instance.init(&context).await {
            // drop anything subscribed before the failure
            self.events.unsubscribe_owner(module_id);
            return Err(e);
        }

        let subscriptions = context.subscriptions().len();
        self.loaded
            .write()
            .await
            .insert(module_id.to_string(), LoadedModule { instance, context });

        info!(module_id = %module_id, subscriptions, "Loaded module");
        Ok(())
    }

    /// Remove the module's event subscriptions and forget its instance.
    /// Returns whether it was loaded.
    pub async fn unload_module(&self, module_id: &str) -> bool {
        let was_loaded = self.loaded.write().await.remove(module_id).is_some();
        let removed = self.events.unsubscribe_owner(module_id);
        if was_loaded {
            info!(module_id = %module_id, subscriptions = removed, "Unloaded module");
        }
        was_loaded
    }

    /// Load every active module, falling back to the bootstrap list when no
    /// active record can be read. Individual failures are logged and skipped.
    pub async fn load_active_modules(&self) -> LoadReport {
        let mut report = LoadReport::default();

        let module_ids = match self.store.list_modules_by_status(ModuleStatus::Active).await {
            Ok(records) if !records.is_empty() => records.into_iter().map(|r| r.slug).collect(),
            Ok(_) => {
                info!("No active modules recorded, loading bootstrap modules");
                report.used_bootstrap = true;
                self.bootstrap_modules.clone()
            }
            Err(e) => {
                warn!(error = %e, "Could not read active modules, loading bootstrap modules");
                report.used_bootstrap = true;
                self.bootstrap_modules.clone()
            }
        };

        for module_id in module_ids {
            match self.load_module(&module_id).await {
                Ok(()) => report.loaded.push(module_id),
                Err(e) => {
                    warn!(module_id = %module_id, error = %e, "Skipping module that failed to load");
                    report.failed.push(module_id);
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Active modules loaded"
        );
        report
    }

    pub async fn is_loaded(&self, module_id: &str) -> bool {
        self.loaded.read().await.contains_key(module_id)
    }

    pub async fn loaded_modules(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.loaded.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    // ---------------------------------------------------------------------
    // Read surface
    // ---------------------------------------------------------------------

    /// Installed and available modules merged, sorted by id. Storage
    /// failures are logged and the available modules alone are returned.
    pub async fn list(&self) -> Vec<ModuleListing> {
        let available = self.discovery.get_available();
        let records: BTreeMap<String, ModuleRecord> = match self.store.list_modules().await {
            Ok(records) => records.into_iter().map(|r| (r.slug.clone(), r)).collect(),
            Err(e) => {
                error!(error = %e, "Failed to list installed modules");
                BTreeMap::new()
            }
        };
        let loaded: BTreeSet<String> = self.loaded_modules().await.into_iter().collect();

        let ids: BTreeSet<&String> = available.keys().chain(records.keys()).collect();
        ids.into_iter()
            .map(|id| {
                listing(
                    id,
                    available.get(id),
                    records.get(id),
                    loaded.contains(id),
                )
            })
            .collect()
    }

    pub async fn get(&self, module_id: &str) -> Option<ModuleListing> {
        let descriptor = self.discovery.find(module_id);
        let record = match self.store.find_module(module_id).await {
            Ok(record) => record,
            Err(e) => {
                error!(module_id = %module_id, error = %e, "Failed to read module record");
                None
            }
        };
        if descriptor.is_none() && record.is_none() {
            return None;
        }

        let loaded = self.is_loaded(module_id).await;
        Some(listing(module_id, descriptor.as_ref(), record.as_ref(), loaded))
    }

    /// Status of every installed module. Empty when storage is unavailable.
    pub async fn status(&self) -> BTreeMap<String, ModuleStatus> {
        match self.store.list_modules().await {
            Ok(records) => records.into_iter().map(|r| (r.slug, r.status)).collect(),
            Err(e) => {
                error!(error = %e, "Failed to read module status");
                BTreeMap::new()
            }
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    async fn installed_record(&self, module_id: &str) -> CmsResult<ModuleRecord> {
        self.store
            .find_module(module_id)
            .await?
            .ok_or_else(|| CmsError::not_found(format!("Module '{module_id}' is not installed")))
    }

    /// Records outlive their module directory; fall back to what the record knows
    fn descriptor_or_record(&self, record: &ModuleRecord) -> ModuleDescriptor {
        self.discovery.find(&record.slug).unwrap_or_else(|| {
            warn!(module_id = %record.slug, "Installed module is no longer available on disk");
            ModuleDescriptor::new(record.slug.clone(), record.name.clone())
                .with_version(record.version.clone())
        })
    }

    async fn check_dependencies(&self, descriptor: &ModuleDescriptor) -> CmsResult<()> {
        let mut missing = Vec::new();
        for dependency in &descriptor.requires {
            match self.store.find_module(dependency).await? {
                Some(record) if record.is_active() => {}
                _ => missing.push(dependency.as_str()),
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CmsError::conflict(format!(
                "Missing dependency: {}",
                missing.join(", ")
            )))
        }
    }

    async fn ensure_no_active_dependents(
        &self,
        operation: &str,
        record: &ModuleRecord,
    ) -> CmsResult<()> {
        let dependents = self.active_dependents(&record.slug).await?;
        if dependents.is_empty() {
            return Ok(());
        }
        Err(CmsError::conflict(format!(
            "Cannot {operation} module '{}': other active modules depend on it: {}",
            record.name,
            dependents.join(", ")
        )))
    }

    /// Names of other active modules whose manifest requires `module_id`
    async fn active_dependents(&self, module_id: &str) -> CmsResult<Vec<String>> {
        let active = self
            .store
            .list_modules_by_status(ModuleStatus::Active)
            .await?;
        let available = self.discovery.get_available();

        Ok(active
            .into_iter()
            .filter(|record| record.slug != module_id)
            .filter(|record| {
                available
                    .get(&record.slug)
                    .map(|d| d.requires.iter().any(|r| r == module_id))
                    .unwrap_or(false)
            })
            .map(|record| record.name)
            .collect())
    }

    /// The loaded instance if there is one, otherwise a fresh one from the
    /// factory. `None` for modules without a registered implementation.
    async fn instantiate(
        &self,
        descriptor: &ModuleDescriptor,
    ) -> CmsResult<Option<Arc<dyn CmsModule>>> {
        if let Some(loaded) = self.loaded.read().await.get(&descriptor.id) {
            return Ok(Some(loaded.instance.clone()));
        }
        self.factories.create(descriptor).transpose()
    }

    async fn context_for(&self, descriptor: &ModuleDescriptor) -> Arc<ModuleContext> {
        if let Some(loaded) = self.loaded.read().await.get(&descriptor.id) {
            return loaded.context.clone();
        }
        Arc::new(self.new_context(descriptor.clone()))
    }

    fn new_context(&self, descriptor: ModuleDescriptor) -> ModuleContext {
        ModuleContext::new(
            descriptor,
            self.events.clone(),
            self.schema.clone(),
            self.default_priority,
        )
    }

    /// SQL files from the module directory followed by code-defined units
    fn migration_units(
        &self,
        descriptor: &ModuleDescriptor,
        instance: Option<&Arc<dyn CmsModule>>,
    ) -> CmsResult<Vec<Arc<dyn MigrationUnit>>> {
        let mut units: Vec<Arc<dyn MigrationUnit>> = Vec::new();

        // built-in descriptors have no directory
        if !descriptor.path.as_os_str().is_empty() {
            for migration in discover_sql_migrations(&descriptor.migrations_dir())? {
                units.push(Arc::new(migration));
            }
        }
        if let Some(instance) = instance {
            units.extend(instance.migrations());
        }
        Ok(units)
    }

    async fn revert_quietly(&self, module_id: &str, units: &[Arc<dyn MigrationUnit>]) {
        if let Err(e) = MigrationRunner::new(self.store.schema())
            .revert(module_id, units)
            .await
        {
            error!(module_id = %module_id, error = %e, "Failed to revert migrations during rollback");
        }
    }

    async fn restore_status(&self, module_id: &str, status: ModuleStatus) {
        if let Err(e) = self.store.update_module_status(module_id, status).await {
            error!(module_id = %module_id, status = %status, error = %e, "Failed to restore module status");
        }
    }
}

fn already_installed(module_id: &str) -> CmsError {
    CmsError::conflict(format!("Module '{module_id}' is already installed"))
}

fn listing(
    id: &str,
    descriptor: Option<&ModuleDescriptor>,
    record: Option<&ModuleRecord>,
    loaded: bool,
) -> ModuleListing {
    ModuleListing {
        id: id.to_string(),
        name: record
            .map(|r| r.name.clone())
            .or_else(|| descriptor.map(|d| d.name.clone()))
            .unwrap_or_else(|| id.to_string()),
        description: record
            .and_then(|r| r.description.clone())
            .or_else(|| descriptor.and_then(|d| d.description.clone())),
        version: record
            .map(|r| r.version.clone())
            .or_else(|| descriptor.map(|d| d.version.clone()))
            .unwrap_or_default(),
        available_version: descriptor.map(|d| d.version.clone()),
        status: record.map(|r| r.status),
        installed: record.is_some(),
        available: descriptor.is_some(),
        loaded,
        requires: descriptor.map(|d| d.requires.clone()).unwrap_or_default(),
    }
}
