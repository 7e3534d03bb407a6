//! Module manifests.
//!
//! Every module directory carries a manifest (`module.yaml`, `module.yml` or
//! `module.json`) describing its identity, version and dependencies:
//!
//! ```yaml
//! id: blog
//! name: Blog
//! version: 1.2.0
//! requires: [core]
//! config:
//!   posts_per_page: 10
//! ```

use crate::error::{CmsError, CmsResult};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Version assumed when a manifest omits one
pub const DEFAULT_MODULE_VERSION: &str = "0.0.0";

fn default_version() -> String {
    DEFAULT_MODULE_VERSION.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Json,
}

impl ManifestFormat {
    /// Format implied by a manifest file name
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Some(Self::Yaml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Identity and metadata for one installable module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Unique slug, also the `modules.slug` of the installed record
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub author_url: Option<String>,
    /// Informational; implementations are resolved through the factory registry
    #[serde(default)]
    pub main_class: Option<String>,
    /// Module ids that must be active before this one installs
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Module directory, resolved at scan time
    #[serde(skip)]
    pub path: PathBuf,
}

impl ModuleDescriptor {
    const MAX_ID_LENGTH: usize = 128;

    /// Descriptor for a module defined in code rather than on disk
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            version: default_version(),
            author: None,
            author_url: None,
            main_class: None,
            requires: Vec::new(),
            config: Map::new(),
            path: PathBuf::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_requires<I, S>(mut self, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = requires.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Parse and validate manifest text
    pub fn parse(content: &str, format: ManifestFormat) -> CmsResult<Self> {
        let descriptor: Self = match format {
            ManifestFormat::Yaml => serde_yaml::from_str(content)?,
            ManifestFormat::Json => serde_json::from_str(content)?,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Read a manifest file; `path` becomes the file's parent directory
    pub fn from_manifest_file(manifest: &Path) -> CmsResult<Self> {
        let format = ManifestFormat::from_path(manifest).ok_or_else(|| {
            CmsError::validation(format!(
                "Unrecognized manifest format: {}",
                manifest.display()
            ))
        })?;
        let content = std::fs::read_to_string(manifest)?;

        let mut descriptor = Self::parse(&content, format)?;
        descriptor.path = manifest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(descriptor)
    }

    pub fn validate(&self) -> CmsResult<()> {
        validate_module_id(&self.id)?;

        if self.name.trim().is_empty() {
            return Err(CmsError::validation(format!(
                "Module '{}' has an empty name",
                self.id
            )));
        }

        Version::parse(&self.version).map_err(|e| {
            CmsError::validation(format!(
                "Module '{}' has invalid version '{}': {e}",
                self.id, self.version
            ))
        })?;

        for dependency in &self.requires {
            validate_module_id(dependency)?;
            if dependency == &self.id {
                return Err(CmsError::validation(format!(
                    "Module '{}' cannot require itself",
                    self.id
                )));
            }
        }

        Ok(())
    }

    /// Parsed version; `None` only for descriptors that skipped validation
    pub fn semver(&self) -> Option<Version> {
        Version::parse(&self.version).ok()
    }

    /// Directory holding the module's SQL migrations
    pub fn migrations_dir(&self) -> PathBuf {
        self.path.join("migrations")
    }
}

/// Module ids are slugs: lowercase ASCII letters, digits, `-` and `_`
pub fn validate_module_id(id: &str) -> CmsResult<()> {
    if id.is_empty() {
        return Err(CmsError::validation("Module id cannot be empty"));
    }
    if id.len() > ModuleDescriptor::MAX_ID_LENGTH {
        return Err(CmsError::validation(format!(
            "Module id exceeds {} characters",
            ModuleDescriptor::MAX_ID_LENGTH
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(CmsError::validation(format!(
            "Module id '{id}' must contain only lowercase letters, digits, '-' and '_'"
        )));
    }
    Ok(())
}
