use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result envelope shared by the directory and every backend engine.
///
/// Serialized as `{"success": <payload>}` or `{"error": "<message>"}`, the format the
/// engines answer with over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    Success(Value),
    #[serde(rename = "error")]
    Failure(String),
}

impl OperationResult {
    pub fn success(payload: impl Into<Value>) -> Self {
        OperationResult::Success(payload.into())
    }

    pub fn failure(message: impl Into<String>) -> Self {
        OperationResult::Failure(message.into())
    }

    /// Confirmation payload used by directory mutations.
    pub fn confirmation(message: impl Into<String>) -> Self {
        OperationResult::Success(serde_json::json!({ "message": message.into() }))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success(_))
    }
}
