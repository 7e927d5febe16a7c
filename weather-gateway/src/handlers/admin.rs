use axum::extract::State;
use gateway_core::error::AppError;

use crate::middleware::CurrentIdentity;
use crate::AppState;

/// Raw contents of the gateway log file. Reserved administrator only.
///
/// GET /logs
pub async fn logs(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
) -> Result<String, AppError> {
    Ok(state.logs.read(&caller, &state.catalog).await?)
}
