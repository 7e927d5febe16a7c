//! Backend engine collaborators.
//!
//! Every engine answers with an [`OperationResult`]. Transport problems are folded into
//! the failure arm so callers only ever see one error shape.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use std::sync::Mutex;

use crate::models::{City, HyperParams, HyperParamsById, OperationResult};

#[async_trait]
pub trait ForecastEngine: Send + Sync {
    async fn forecast(&self, city: &City) -> OperationResult;
}

#[async_trait]
pub trait TrainingEngine: Send + Sync {
    async fn train_one(&self, city: &City, params: &HyperParams, label: &str) -> OperationResult;

    /// Forward a whole sweep. Concurrency and partial failures are the engine's concern.
    async fn train_many(
        &self,
        city: &City,
        label: &str,
        params_by_id: &HyperParamsById,
    ) -> OperationResult;

    async fn retrain(&self, city: &City, n_epochs: u32) -> OperationResult;
}

#[async_trait]
pub trait DataEngine: Send + Sync {
    async fn ingest_historical(&self) -> OperationResult;

    async fn refresh_current(&self) -> OperationResult;

    async fn purge_all(&self) -> OperationResult;
}

/// HTTP client for one engine base URL. Implements all three engine traits so a single
/// deployment can serve several roles; each role is wired to its own base URL.
#[derive(Clone)]
pub struct EngineClient {
    http: Client,
    base_url: String,
    name: &'static str,
}

#[derive(Serialize)]
struct TrainOneBody<'a> {
    train_label: &'a str,
    hyper_params: &'a HyperParams,
}

#[derive(Serialize)]
struct TrainManyBody<'a> {
    train_label: &'a str,
    hyper_params_by_id: &'a HyperParamsById,
}

#[derive(Serialize)]
struct RetrainBody {
    n_epochs: u32,
}

impl EngineClient {
    pub fn new(name: &'static str, base_url: impl Into<String>) -> Self {
        Self::with_client(name, base_url, Client::new())
    }

    pub fn with_client(name: &'static str, base_url: impl Into<String>, http: Client) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            name,
        }
    }

    async fn call<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> OperationResult {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(engine = self.name, %method, %url, "Calling engine");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(engine = self.name, %url, error = %e, "Engine unreachable");
                return OperationResult::failure(format!("{} engine unreachable: {}", self.name, e));
            }
        };

        let status = response.status();
        match response.json::<OperationResult>().await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    engine = self.name,
                    %url,
                    %status,
                    error = %e,
                    "Engine returned an undecodable response"
                );
                OperationResult::failure(format!(
                    "{} engine returned an invalid response (status {})",
                    self.name, status
                ))
            }
        }
    }
}

#[async_trait]
impl ForecastEngine for EngineClient {
    async fn forecast(&self, city: &City) -> OperationResult {
        self.call::<()>(Method::POST, &format!("/forecast/{}", city), None)
            .await
    }
}

#[async_trait]
impl TrainingEngine for EngineClient {
    async fn train_one(&self, city: &City, params: &HyperParams, label: &str) -> OperationResult {
        let body = TrainOneBody {
            train_label: label,
            hyper_params: params,
        };
        self.call(Method::POST, &format!("/train/{}", city), Some(&body))
            .await
    }

    async fn train_many(
        &self,
        city: &City,
        label: &str,
        params_by_id: &HyperParamsById,
    ) -> OperationResult {
        let body = TrainManyBody {
            train_label: label,
            hyper_params_by_id: params_by_id,
        };
        self.call(Method::POST, &format!("/train-sweep/{}", city), Some(&body))
            .await
    }

    async fn retrain(&self, city: &City, n_epochs: u32) -> OperationResult {
        self.call(
            Method::POST,
            &format!("/retrain/{}", city),
            Some(&RetrainBody { n_epochs }),
        )
        .await
    }
}

#[async_trait]
impl DataEngine for EngineClient {
    async fn ingest_historical(&self) -> OperationResult {
        self.call::<()>(Method::POST, "/historical", None).await
    }

    async fn refresh_current(&self) -> OperationResult {
        self.call::<()>(Method::POST, "/refresh", None).await
    }

    async fn purge_all(&self) -> OperationResult {
        self.call::<()>(Method::DELETE, "/weather", None).await
    }
}

/// A call received by [`MockEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Forecast(City),
    TrainOne {
        city: City,
        label: String,
        params: HyperParams,
    },
    TrainMany {
        city: City,
        label: String,
        params_by_id: HyperParamsById,
    },
    Retrain {
        city: City,
        n_epochs: u32,
    },
    IngestHistorical,
    RefreshCurrent,
    PurgeAll,
}

/// Mock engine for testing. Records every call and answers with a fixed reply.
pub struct MockEngine {
    reply: Mutex<OperationResult>,
    calls: Mutex<Vec<EngineCall>>,
}

impl MockEngine {
    pub fn new(reply: OperationResult) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, reply: OperationResult) {
        if let Ok(mut current) = self.reply.lock() {
            *current = reply;
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: EngineCall) -> OperationResult {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        self.reply
            .lock()
            .map(|reply| reply.clone())
            .unwrap_or_else(|_| OperationResult::failure("mock engine poisoned"))
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new(OperationResult::success(serde_json::json!({})))
    }
}

#[async_trait]
impl ForecastEngine for MockEngine {
    async fn forecast(&self, city: &City) -> OperationResult {
        self.record(EngineCall::Forecast(city.clone()))
    }
}

#[async_trait]
impl TrainingEngine for MockEngine {
    async fn train_one(&self, city: &City, params: &HyperParams, label: &str) -> OperationResult {
        self.record(EngineCall::TrainOne {
            city: city.clone(),
            label: label.to_string(),
            params: params.clone(),
        })
    }

    async fn train_many(
        &self,
        city: &City,
        label: &str,
        params_by_id: &HyperParamsById,
    ) -> OperationResult {
        self.record(EngineCall::TrainMany {
            city: city.clone(),
            label: label.to_string(),
            params_by_id: params_by_id.clone(),
        })
    }

    async fn retrain(&self, city: &City, n_epochs: u32) -> OperationResult {
        self.record(EngineCall::Retrain {
            city: city.clone(),
            n_epochs,
        })
    }
}

#[async_trait]
impl DataEngine for MockEngine {
    async fn ingest_historical(&self) -> OperationResult {
        self.record(EngineCall::IngestHistorical)
    }

    async fn refresh_current(&self) -> OperationResult {
        self.record(EngineCall::RefreshCurrent)
    }

    async fn purge_all(&self) -> OperationResult {
        self.record(EngineCall::PurgeAll)
    }
}
