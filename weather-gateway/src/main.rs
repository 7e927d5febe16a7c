use gateway_core::error::AppError;
use gateway_core::observability::{init_tracing, TracingSettings};
use gateway_core::middleware::rate_limit::spawn_pruning;
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use weather_gateway::{
    build_router,
    config::{Environment, GatewayConfig},
    services::{
        EngineClient, IdentityStore, InMemoryIdentityStore, JobDispatcher, PgIdentityStore,
        ServiceError,
    },
    utils::Password,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = GatewayConfig::from_env()?;

    init_tracing(&TracingSettings {
        service_name: config.service_name.clone(),
        log_level: config.log_level.clone(),
        otlp_endpoint: config.otlp_endpoint.clone(),
        log_file: config.log_file.clone(),
    })?;

    weather_gateway::services::metrics::init_metrics()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting weather gateway"
    );

    let store: Arc<dyn IdentityStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to identity store");
            let store = PgIdentityStore::connect(url, 10)
                .await
                .map_err(ServiceError::from)?;
            Arc::new(store)
        }
        None => {
            if config.environment == Environment::Prod {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_URL is required in production"
                )));
            }
            tracing::warn!("DATABASE_URL not set; identities are kept in memory");
            Arc::new(InMemoryIdentityStore::new())
        }
    };

    let dispatcher = JobDispatcher::new(
        Arc::new(EngineClient::new("forecast", &config.engines.forecast_url)),
        Arc::new(EngineClient::new("training", &config.engines.training_url)),
        Arc::new(EngineClient::new("data", &config.engines.data_url)),
    );
    tracing::info!(
        forecast = %config.engines.forecast_url,
        training = %config.engines.training_url,
        data = %config.engines.data_url,
        "Engine clients initialized"
    );

    let admin_password = Password::new(config.admin.password.expose_secret().clone());
    let addr = config.common.socket_addr();

    let state = AppState::new(config, store, dispatcher);
    state.directory.ensure_administrator(&admin_password).await?;

    spawn_pruning(
        state.login_rate_limiter.limiter().clone(),
        Duration::from_secs(state.config.rate_limit.login_window_seconds),
    );

    let service_span = tracing::info_span!(
        "service",
        service = %state.config.service_name,
        version = %state.config.service_version,
        environment = ?state.config.environment,
    );

    let app = build_router(state);
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    gateway_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
