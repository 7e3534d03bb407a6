//! # Module System
//!
//! Installable units of extra behaviour: discovered from manifests on disk,
//! installed with their migrations, and loaded at boot to subscribe handlers
//! on the event bus.
//!
//! - [`descriptor`] - manifest parsing and validation
//! - [`discovery`] - scanning search paths for modules
//! - [`module`] - the `CmsModule` trait, factories and `ModuleContext`
//! - [`manager`] - install / activate / deactivate / uninstall and runtime loading
//! - [`result`] - `OperationResult` returned by lifecycle operations

pub mod descriptor;
pub mod discovery;
pub mod manager;
pub mod module;
pub mod result;

pub use descriptor::{validate_module_id, ManifestFormat, ModuleDescriptor, DEFAULT_MODULE_VERSION};
pub use discovery::{DescriptorMap, ModuleDiscovery};
pub use manager::{LoadReport, ModuleListing, ModuleManager};
pub use module::{CmsModule, ModuleContext, ModuleFactory, ModuleFactoryRegistry};
pub use result::OperationResult;

pub use crate::models::{ModuleRecord, ModuleStatus, NewModuleRecord};
