use std::sync::Arc;

use crate::models::{Capability, City, HyperParams, HyperParamsById, Identity, OperationResult};
use crate::services::engines::{DataEngine, ForecastEngine, TrainingEngine};
use crate::services::{PermissionGate, ServiceError};

/// Routes authorized requests to the backend engines.
///
/// Every method checks the caller's capability before the engine is contacted; a refused
/// request never reaches an engine. Engine replies are returned unchanged.
#[derive(Clone)]
pub struct JobDispatcher {
    forecast: Arc<dyn ForecastEngine>,
    training: Arc<dyn TrainingEngine>,
    data: Arc<dyn DataEngine>,
}

impl JobDispatcher {
    pub fn new(
        forecast: Arc<dyn ForecastEngine>,
        training: Arc<dyn TrainingEngine>,
        data: Arc<dyn DataEngine>,
    ) -> Self {
        Self {
            forecast,
            training,
            data,
        }
    }

    pub async fn forecast(
        &self,
        caller: &Identity,
        city: &City,
    ) -> Result<OperationResult, ServiceError> {
        PermissionGate::authorize(caller, Capability::Forecasting)?;
        tracing::info!(user_id = %caller.user_id, %city, "Dispatching forecast");
        Ok(self.forecast.forecast(city).await)
    }

    pub async fn train_one(
        &self,
        caller: &Identity,
        city: &City,
        params: &HyperParams,
        label: &str,
    ) -> Result<OperationResult, ServiceError> {
        PermissionGate::authorize(caller, Capability::Training)?;
        tracing::info!(user_id = %caller.user_id, %city, label, "Dispatching training run");
        Ok(self.training.train_one(city, params, label).await)
    }

    pub async fn train_many(
        &self,
        caller: &Identity,
        city: &City,
        label: &str,
        params_by_id: &HyperParamsById,
    ) -> Result<OperationResult, ServiceError> {
        PermissionGate::authorize(caller, Capability::Training)?;
        tracing::info!(
            user_id = %caller.user_id,
            %city,
            label,
            configurations = params_by_id.len(),
            "Dispatching training sweep"
        );
        Ok(self.training.train_many(city, label, params_by_id).await)
    }

    pub async fn retrain(
        &self,
        caller: &Identity,
        city: &City,
        n_epochs: u32,
    ) -> Result<OperationResult, ServiceError> {
        PermissionGate::authorize(caller, Capability::Training)?;
        tracing::info!(user_id = %caller.user_id, %city, n_epochs, "Dispatching retrain");
        Ok(self.training.retrain(city, n_epochs).await)
    }

    pub async fn ingest_historical(
        &self,
        caller: &Identity,
    ) -> Result<OperationResult, ServiceError> {
        PermissionGate::authorize(caller, Capability::DataIngestion)?;
        tracing::info!(user_id = %caller.user_id, "Dispatching historical ingestion");
        Ok(self.data.ingest_historical().await)
    }

    pub async fn refresh_current(
        &self,
        caller: &Identity,
    ) -> Result<OperationResult, ServiceError> {
        PermissionGate::authorize(caller, Capability::DataIngestion)?;
        tracing::info!(user_id = %caller.user_id, "Dispatching current-weather refresh");
        Ok(self.data.refresh_current().await)
    }

    pub async fn purge_all(&self, caller: &Identity) -> Result<OperationResult, ServiceError> {
        PermissionGate::authorize(caller, Capability::DataIngestion)?;
        tracing::warn!(user_id = %caller.user_id, "Dispatching full weather data purge");
        Ok(self.data.purge_all().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::engines::{EngineCall, MockEngine};
    use serde_json::{json, Map};
    use std::collections::BTreeSet;

    fn caller(active: bool, caps: &[Capability]) -> Identity {
        Identity {
            user_id: "alice".to_string(),
            full_name: None,
            email: None,
            active,
            capabilities: caps.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn params(n_epochs: u32, learning_rate: f64) -> HyperParams {
        HyperParams {
            n_epochs,
            batch_size: 32,
            learning_rate,
            extra: Map::new(),
        }
    }

    fn dispatcher(engine: &Arc<MockEngine>) -> JobDispatcher {
        JobDispatcher::new(engine.clone(), engine.clone(), engine.clone())
    }

    #[tokio::test]
    async fn train_many_forwards_the_whole_sweep() {
        let engine = Arc::new(MockEngine::new(OperationResult::success(
            json!({ "sweep_id": "sw-42" }),
        )));
        let dispatcher = dispatcher(&engine);
        let city = City::parse("margaux").unwrap();
        let sweep: HyperParamsById = [
            ("cfgA".to_string(), params(10, 0.01)),
            ("cfgB".to_string(), params(20, 0.001)),
        ]
        .into_iter()
        .collect();

        let result = dispatcher
            .train_many(&caller(true, &[Capability::Training]), &city, "exp1", &sweep)
            .await
            .unwrap();

        assert_eq!(result, OperationResult::success(json!({ "sweep_id": "sw-42" })));
        assert_eq!(
            engine.calls(),
            vec![EngineCall::TrainMany {
                city,
                label: "exp1".to_string(),
                params_by_id: sweep,
            }]
        );
    }

    #[tokio::test]
    async fn refused_request_never_reaches_the_engine() {
        let engine = Arc::new(MockEngine::default());
        let dispatcher = dispatcher(&engine);
        let city = City::parse("margaux").unwrap();
        let forecaster = caller(true, &[Capability::Forecasting]);

        assert!(matches!(
            dispatcher.retrain(&forecaster, &city, 5).await,
            Err(ServiceError::Authorization(_))
        ));
        assert!(matches!(
            dispatcher.purge_all(&forecaster).await,
            Err(ServiceError::Authorization(_))
        ));
        assert!(matches!(
            dispatcher
                .forecast(&caller(false, &[Capability::Forecasting]), &city)
                .await,
            Err(ServiceError::Authorization(_))
        ));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn engine_failure_is_returned_unchanged() {
        let engine = Arc::new(MockEngine::new(OperationResult::failure(
            "no data for city",
        )));
        let dispatcher = dispatcher(&engine);
        let city = City::parse("margaux").unwrap();

        let result = dispatcher
            .forecast(&caller(true, &[Capability::Forecasting]), &city)
            .await
            .unwrap();
        assert_eq!(result, OperationResult::failure("no data for city"));
    }

    #[tokio::test]
    async fn data_operations_route_to_the_data_engine() {
        let engine = Arc::new(MockEngine::default());
        let dispatcher = dispatcher(&engine);
        let ingester = caller(true, &[Capability::DataIngestion]);

        dispatcher.ingest_historical(&ingester).await.unwrap();
        dispatcher.refresh_current(&ingester).await.unwrap();
        dispatcher.purge_all(&ingester).await.unwrap();

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::IngestHistorical,
                EngineCall::RefreshCurrent,
                EngineCall::PurgeAll
            ]
        );
    }
}
