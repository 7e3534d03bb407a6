//! # Module Discovery
//!
//! Enumerates candidate modules from registered search paths. Each
//! immediate subdirectory of a search path holding a recognized manifest
//! file is one module. Search paths are scanned in registration order and a
//! later module with a duplicate id replaces the earlier one, so paths should
//! be added from lowest to highest priority.

use super::descriptor::ModuleDescriptor;
use crate::config::ModulesConfig;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub type DescriptorMap = BTreeMap<String, ModuleDescriptor>;

#[derive(Debug)]
pub struct ModuleDiscovery {
    search_paths: RwLock<Vec<PathBuf>>,
    manifest_files: Vec<String>,
    /// Modules compiled into the host rather than found on disk
    builtin: RwLock<DescriptorMap>,
    available: RwLock<Option<DescriptorMap>>,
}

impl ModuleDiscovery {
    pub fn new(manifest_files: Vec<String>) -> Self {
        Self {
            search_paths: RwLock::new(Vec::new()),
            manifest_files,
            builtin: RwLock::new(BTreeMap::new()),
            available: RwLock::new(None),
        }
    }

    /// Discovery over the configured search paths; missing paths are skipped
    pub fn from_config(config: &ModulesConfig) -> Self {
        let discovery = Self::new(config.manifest_files.clone());
        for path in &config.search_paths {
            if !discovery.add_search_path(path) {
                debug!(path = %path.display(), "Configured module search path does not exist");
            }
        }
        discovery
    }

    /// Register a directory to scan. Returns `false`, registering nothing,
    /// when the path is not an existing directory.
    pub fn add_search_path(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if !path.is_dir() {
            return false;
        }

        let mut paths = self.search_paths.write();
        if !paths.iter().any(|p| p == path) {
            paths.push(path.to_path_buf());
        }
        true
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.search_paths.read().clone()
    }

    /// Make a descriptor available without a manifest on disk. Scanned
    /// modules with the same id take precedence.
    pub fn register_descriptor(&self, descriptor: ModuleDescriptor) {
        self.builtin
            .write()
            .insert(descriptor.id.clone(), descriptor);
        // Force the next lookup to merge the new descriptor
        *self.available.write() = None;
    }

    /// First recognized manifest inside a module directory
    fn find_manifest(&self, module_dir: &Path) -> Option<PathBuf> {
        self.manifest_files
            .iter()
            .map(|name| module_dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    fn scan_path(&self, root: &Path, modules: &mut DescriptorMap) {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %root.display(), error = %e, "Failed to read module search path");
                return;
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            let Some(manifest) = self.find_manifest(&dir) else {
                continue;
            };

            match ModuleDescriptor::from_manifest_file(&manifest) {
                Ok(descriptor) => {
                    if let Some(previous) = modules.get(&descriptor.id) {
                        debug!(
                            module_id = %descriptor.id,
                            replaced = %previous.path.display(),
                            by = %descriptor.path.display(),
                            "Module overridden by later search path"
                        );
                    }
                    modules.insert(descriptor.id.clone(), descriptor);
                }
                Err(e) => warn!(
                    manifest = %manifest.display(),
                    error = %e,
                    "Skipping module with invalid manifest"
                ),
            }
        }
    }

    /// Rescan every search path and replace the cached result
    pub fn scan(&self) -> DescriptorMap {
        let mut modules = self.builtin.read().clone();
        for root in self.search_paths() {
            self.scan_path(&root, &mut modules);
        }

        debug!(count = modules.len(), "Module scan complete");
        *self.available.write() = Some(modules.clone());
        modules
    }

    /// Cached scan result, scanning once if nothing is cached
    pub fn get_available(&self) -> DescriptorMap {
        if let Some(cached) = self.available.read().as_ref() {
            return cached.clone();
        }
        self.scan()
    }

    /// Look up one descriptor, rescanning once on a cache miss
    pub fn find(&self, id: &str) -> Option<ModuleDescriptor> {
        if let Some(descriptor) = self.get_available().get(id) {
            return Some(descriptor.clone());
        }
        self.scan().get(id).cloned()
    }
}
