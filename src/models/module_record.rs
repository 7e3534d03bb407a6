use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Installed module status, persisted as `'inactive'` / `'active'`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Installed but not running
    #[default]
    Inactive,
    /// Installed and loaded at boot
    Active,
}

impl ModuleStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModuleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(Self::Inactive),
            "active" => Ok(Self::Active),
            _ => Err(format!("Invalid module status: {s}")),
        }
    }
}

/// ModuleRecord tracks one installed module
/// Maps to `modules` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: i64,
    pub name: String,
    /// Module id from the manifest; unique
    pub slug: String,
    pub description: Option<String>,
    pub status: ModuleStatus,
    pub version: String,
    pub config: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub installed_at: DateTime<Utc>,
}

impl ModuleRecord {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// New ModuleRecord for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewModuleRecord {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub version: String,
    pub config: Map<String, Value>,
}
