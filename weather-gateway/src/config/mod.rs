use gateway_core::config as core_config;
use gateway_core::error::AppError;
use secrecy::Secret;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub otlp_endpoint: Option<String>,
    /// Absent in development means the in-memory identity store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub admin: AdminConfig,
    pub engines: EngineConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub access_token_expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub user_id: String,
    pub password: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub forecast_url: String,
    pub training_url: String,
    pub data_url: String,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// Peers whose `x-forwarded-for` header is believed.
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_str = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let get_env =
            |key: &str, default: Option<&str>| require_env(&lookup, key, default, is_prod);

        let config = GatewayConfig {
            common,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("weather-gateway"))?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")))?,
            log_level: get_env("LOG_LEVEL", Some("info"))?,
            log_file: lookup("LOG_FILE").map(PathBuf::from),
            otlp_endpoint: lookup("OTLP_ENDPOINT"),
            database_url: lookup("DATABASE_URL"),
            jwt: JwtConfig {
                secret: Secret::new(get_env("JWT_SECRET", None)?),
                access_token_expiry_minutes: get_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    Some("30"),
                )?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "JWT_ACCESS_TOKEN_EXPIRY_MINUTES: {}",
                        e
                    ))
                })?,
            },
            admin: AdminConfig {
                user_id: get_env("ADMIN_USER_ID", Some("admin"))?,
                password: Secret::new(get_env("ADMIN_PASSWORD", None)?),
            },
            engines: EngineConfig {
                forecast_url: get_env("FORECAST_ENGINE_URL", Some("http://localhost:8001"))?,
                training_url: get_env("TRAINING_ENGINE_URL", Some("http://localhost:8001"))?,
                data_url: get_env("DATA_ENGINE_URL", Some("http://localhost:8002"))?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"))?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                trusted_proxies: parse_trusted_proxies(
                    &lookup("TRUSTED_PROXIES").unwrap_or_default(),
                )?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_number(
                    "LOGIN_RATE_LIMIT_ATTEMPTS",
                    &get_env("LOGIN_RATE_LIMIT_ATTEMPTS", Some("5"))?,
                )?,
                login_window_seconds: parse_number(
                    "LOGIN_RATE_LIMIT_WINDOW_SECONDS",
                    &get_env("LOGIN_RATE_LIMIT_WINDOW_SECONDS", Some("60"))?,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.rate_limit.login_attempts == 0 || self.rate_limit.login_window_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Login rate limit attempts and window must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.database_url.is_none() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_URL is required in production"
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }
        }

        Ok(())
    }
}

fn require_env<F>(
    lookup: &F,
    key: &str,
    default: Option<&str>,
    is_prod: bool,
) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

fn parse_trusted_proxies(value: &str) -> Result<Vec<IpAddr>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("TRUSTED_PROXIES: '{}': {}", s, e))
            })
        })
        .collect()
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
