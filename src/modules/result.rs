use crate::error::{CmsError, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a lifecycle operation, shaped for the HTTP layer as
/// `{success, message?, data?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip)]
    pub error_kind: Option<ErrorKind>,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            error_kind: None,
        }
    }

    pub fn failure(error: &CmsError) -> Self {
        Self {
            success: false,
            message: Some(error.detail()),
            data: None,
            error_kind: Some(error.kind()),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// 404 for missing modules, 500 for storage and internal failures,
    /// otherwise 200 with the success flag carrying the outcome
    pub fn http_status(&self) -> u16 {
        self.error_kind.map(|kind| kind.http_status()).unwrap_or(200)
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

impl From<CmsError> for OperationResult {
    fn from(error: CmsError) -> Self {
        Self::failure(&error)
    }
}
