//! Data ingestion, forecasting and training routes.
//!
//! Each handler checks the caller's capability before looking at its input, so a caller
//! without the capability gets 403 whatever the request contains. Body and query
//! rejections are held back until after that check.

use axum::extract::{
    rejection::{JsonRejection, QueryRejection},
    Json, Path, Query, State,
};
use gateway_core::error::AppError;
use serde_json::Value;
use validator::Validate;

use super::{json_input, query_input};
use crate::middleware::CurrentIdentity;
use crate::models::{
    Capability, City, HyperParams, HyperParamsById, RetrainQuery, TrainQuery,
};
use crate::services::{translate, PermissionGate, ServiceError};
use crate::AppState;

fn parse_city(raw: &str) -> Result<City, ServiceError> {
    City::parse(raw).map_err(ServiceError::Validation)
}

/// POST /weather/historical
pub async fn ingest_historical(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
) -> Result<Json<Value>, AppError> {
    PermissionGate::authorize(&caller, Capability::DataIngestion)?;
    let result = state.dispatcher.ingest_historical(&caller).await?;
    Ok(Json(translate(result)?))
}

/// POST /weather/refresh
pub async fn refresh_current(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
) -> Result<Json<Value>, AppError> {
    PermissionGate::authorize(&caller, Capability::DataIngestion)?;
    let result = state.dispatcher.refresh_current(&caller).await?;
    Ok(Json(translate(result)?))
}

/// DELETE /weather
pub async fn purge_all(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
) -> Result<Json<Value>, AppError> {
    PermissionGate::authorize(&caller, Capability::DataIngestion)?;
    let result = state.dispatcher.purge_all(&caller).await?;
    Ok(Json(translate(result)?))
}

/// POST /forecast/{city}
pub async fn forecast(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(city): Path<String>,
) -> Result<Json<Value>, AppError> {
    PermissionGate::authorize(&caller, Capability::Forecasting)?;
    let city = parse_city(&city)?;
    let result = state.dispatcher.forecast(&caller, &city).await?;
    Ok(Json(translate(result)?))
}

/// POST /train/{city}?train_label=
pub async fn train_one(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(city): Path<String>,
    query: Result<Query<TrainQuery>, QueryRejection>,
    params: Result<Json<HyperParams>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    PermissionGate::authorize(&caller, Capability::Training)?;
    let city = parse_city(&city)?;
    let query = query_input(query)?;
    let params = json_input(params)?;
    query.validate()?;
    params.validate()?;

    let result = state
        .dispatcher
        .train_one(&caller, &city, &params, &query.train_label)
        .await?;
    Ok(Json(translate(result)?))
}

/// POST /train-sweep/{city}?train_label=
pub async fn train_many(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(city): Path<String>,
    query: Result<Query<TrainQuery>, QueryRejection>,
    params_by_id: Result<Json<HyperParamsById>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    PermissionGate::authorize(&caller, Capability::Training)?;
    let city = parse_city(&city)?;
    let query = query_input(query)?;
    let params_by_id = json_input(params_by_id)?;
    query.validate()?;

    if params_by_id.is_empty() {
        return Err(AppError::InvalidInput(
            "A sweep needs at least one configuration".to_string(),
        ));
    }
    for (config_id, params) in &params_by_id {
        if config_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Configuration names must not be empty".to_string(),
            ));
        }
        params.validate()?;
    }

    let result = state
        .dispatcher
        .train_many(&caller, &city, &query.train_label, &params_by_id)
        .await?;
    Ok(Json(translate(result)?))
}

/// POST /retrain/{city}?n_epochs=
pub async fn retrain(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(city): Path<String>,
    query: Result<Query<RetrainQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    PermissionGate::authorize(&caller, Capability::Training)?;
    let city = parse_city(&city)?;
    let query = query_input(query)?;
    query.validate()?;

    let result = state
        .dispatcher
        .retrain(&caller, &city, query.n_epochs)
        .await?;
    Ok(Json(translate(result)?))
}
