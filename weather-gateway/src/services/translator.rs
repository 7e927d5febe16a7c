use serde_json::Value;

use crate::models::OperationResult;
use crate::services::ServiceError;

/// Unwrap an operation envelope into the value returned to the caller.
///
/// A failure becomes [`ServiceError::Operation`] carrying the engine's message verbatim.
pub fn translate(result: OperationResult) -> Result<Value, ServiceError> {
    match result {
        OperationResult::Success(payload) => Ok(payload),
        OperationResult::Failure(message) => {
            tracing::warn!(error = %message, "Operation reported failure");
            Err(ServiceError::Operation(message))
        }
    }
}
