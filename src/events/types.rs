use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known event names
pub mod names {
    pub const MODULE_INSTALLED: &str = "module.installed";
    pub const MODULE_ACTIVATED: &str = "module.activated";
    pub const MODULE_DEACTIVATED: &str = "module.deactivated";
    pub const MODULE_UNINSTALLED: &str = "module.uninstalled";
    pub const CONTENT_SAVING: &str = "content.saving";
    pub const CONTENT_SAVED: &str = "content.saved";
    pub const CONTENT_DELETED: &str = "content.deleted";
    pub const USER_SAVED: &str = "user.saved";
    pub const USER_DELETED: &str = "user.deleted";
}

/// Events published on the [`EventBus`](super::EventBus).
///
/// Each event name has exactly one payload shape. Module-defined events use
/// [`Event::Custom`], whose name is chosen by the module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    ModuleInstalled {
        module_id: String,
    },
    ModuleActivated {
        module_id: String,
    },
    ModuleDeactivated {
        module_id: String,
    },
    ModuleUninstalled {
        module_id: String,
    },
    /// Published before a content record is persisted; a `Stop` vetoes the save
    ContentSaving {
        content_type_id: i64,
        content_id: Option<i64>,
        data: Map<String, Value>,
    },
    ContentSaved {
        content_type_id: i64,
        content_id: i64,
        data: Map<String, Value>,
    },
    ContentDeleted {
        content_type_id: i64,
        content_id: i64,
    },
    UserSaved {
        user_id: i64,
        data: Map<String, Value>,
    },
    UserDeleted {
        user_id: i64,
    },
    Custom {
        name: String,
        payload: Value,
    },
}

impl Event {
    /// Name subscriptions are keyed by
    pub fn name(&self) -> &str {
        match self {
            Self::ModuleInstalled { .. } => names::MODULE_INSTALLED,
            Self::ModuleActivated { .. } => names::MODULE_ACTIVATED,
            Self::ModuleDeactivated { .. } => names::MODULE_DEACTIVATED,
            Self::ModuleUninstalled { .. } => names::MODULE_UNINSTALLED,
            Self::ContentSaving { .. } => names::CONTENT_SAVING,
            Self::ContentSaved { .. } => names::CONTENT_SAVED,
            Self::ContentDeleted { .. } => names::CONTENT_DELETED,
            Self::UserSaved { .. } => names::USER_SAVED,
            Self::UserDeleted { .. } => names::USER_DELETED,
            Self::Custom { name, .. } => name,
        }
    }

    pub fn custom(name: impl Into<String>, payload: Value) -> Self {
        Self::Custom {
            name: name.into(),
            payload,
        }
    }

    /// Module the event concerns, for module lifecycle events
    pub fn module_id(&self) -> Option<&str> {
        match self {
            Self::ModuleInstalled { module_id }
            | Self::ModuleActivated { module_id }
            | Self::ModuleDeactivated { module_id }
            | Self::ModuleUninstalled { module_id } => Some(module_id),
            _ => None,
        }
    }
}
