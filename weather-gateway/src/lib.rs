pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use gateway_core::axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Json, Router,
};
use gateway_core::error::AppError;
use gateway_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimit},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::models::PermissionCatalog;
use crate::services::{
    IdentityStore, JobDispatcher, LogReader, TokenAuthenticator, UserDirectory,
};
use crate::utils::{Argon2Hasher, CredentialHasher};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub catalog: Arc<PermissionCatalog>,
    pub store: Arc<dyn IdentityStore>,
    pub authenticator: TokenAuthenticator,
    pub directory: UserDirectory,
    pub dispatcher: JobDispatcher,
    pub logs: LogReader,
    pub login_rate_limiter: IpRateLimit,
}

impl AppState {
    /// Wire the access-control core around an identity store and the engine dispatcher.
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn IdentityStore>,
        dispatcher: JobDispatcher,
    ) -> Self {
        let catalog = Arc::new(PermissionCatalog::new(config.admin.user_id.clone()));
        let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher);

        let authenticator = TokenAuthenticator::new(&config.jwt, store.clone(), hasher.clone());
        let directory = UserDirectory::new(store.clone(), hasher, catalog.clone());
        let logs = LogReader::new(config.log_file.clone());
        let login_rate_limiter = IpRateLimit::new(
            create_ip_rate_limiter(
                config.rate_limit.login_attempts,
                config.rate_limit.login_window_seconds,
            ),
            config.security.trusted_proxies.clone(),
        );

        Self {
            config: Arc::new(config),
            catalog,
            store,
            authenticator,
            directory,
            dispatcher,
            logs,
            login_rate_limiter,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Brute-force protection applies to the login route only.
    let login_route = Router::new()
        .route("/token", post(handlers::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let protected_routes = Router::new()
        .route("/users/me", get(handlers::who_am_i))
        .route("/users", post(handlers::add_user))
        .route(
            "/users/:user_id",
            put(handlers::edit_user).delete(handlers::delete_user),
        )
        .route(
            "/users/:user_id/permissions/:permission_id",
            post(handlers::add_permission).delete(handlers::remove_permission),
        )
        .route("/logs", get(handlers::logs))
        .route("/weather/historical", post(handlers::ingest_historical))
        .route("/weather/refresh", post(handlers::refresh_current))
        .route("/weather", delete(handlers::purge_all))
        .route("/forecast/:city", post(handlers::forecast))
        .route("/train/:city", post(handlers::train_one))
        .route("/train-sweep/:city", post(handlers::train_many))
        .route("/retrain/:city", post(handlers::retrain))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .merge(login_route)
        .merge(protected_routes)
        .with_state(state.clone())
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &gateway_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Service health check
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Identity store health check failed");
        AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "identity_store": "up"
        }
    })))
}
