#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
    Router,
};
use gateway_core::config::Config as CoreConfig;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tower::util::ServiceExt;
use weather_gateway::{
    build_router,
    config::GatewayConfig,
    services::{InMemoryIdentityStore, JobDispatcher, MockEngine},
    utils::Password,
    AppState,
};

pub const ADMIN_ID: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryIdentityStore>,
    pub engine: Arc<MockEngine>,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(&[]).await
    }

    /// Build the full router over an in-memory store and a mock engine. `overrides`
    /// replace or add configuration keys.
    pub async fn spawn_with(overrides: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = [
            ("JWT_SECRET", "integration-test-signing-secret"),
            ("ADMIN_USER_ID", ADMIN_ID),
            ("ADMIN_PASSWORD", ADMIN_PASSWORD),
            ("LOG_LEVEL", "error"),
            ("LOGIN_RATE_LIMIT_ATTEMPTS", "1000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in overrides {
            vars.insert(k.to_string(), v.to_string());
        }

        let config = GatewayConfig::from_lookup(CoreConfig::default(), |key| {
            vars.get(key).cloned()
        })
        .expect("Failed to build test configuration");

        let store = Arc::new(InMemoryIdentityStore::new());
        let engine = Arc::new(MockEngine::default());
        let dispatcher = JobDispatcher::new(engine.clone(), engine.clone(), engine.clone());

        let state = AppState::new(config, store.clone(), dispatcher);
        state
            .directory
            .ensure_administrator(&Password::new(ADMIN_PASSWORD.to_string()))
            .await
            .expect("Failed to provision administrator");

        TestApp {
            router: build_router(state.clone()),
            state,
            store,
            engine,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        Reply {
            status,
            headers,
            body,
        }
    }

    /// Log in from a connection whose peer address is `client_ip`.
    pub async fn login_raw(&self, username: &str, password: &str, client_ip: &str) -> Reply {
        self.login_via(username, password, client_ip, None).await
    }

    /// Log in from peer `peer_ip`, optionally carrying an `x-forwarded-for` header.
    pub async fn login_via(
        &self,
        username: &str,
        password: &str,
        peer_ip: &str,
        forwarded_for: Option<&str>,
    ) -> Reply {
        let peer = SocketAddr::new(peer_ip.parse::<IpAddr>().unwrap(), 40000);
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .extension(ConnectInfo(peer));
        if let Some(forwarded_for) = forwarded_for {
            builder = builder.header("x-forwarded-for", forwarded_for);
        }
        let request = builder
            .body(Body::from(format!(
                "grant_type=password&username={}&password={}",
                username, password
            )))
            .unwrap();

        self.send(request).await
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let reply = self.login_raw(username, password, "10.0.0.1").await;
        assert_eq!(reply.status, StatusCode::OK, "login failed: {}", reply.body);
        reply.body["access_token"]
            .as_str()
            .expect("access_token missing")
            .to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_ID, ADMIN_PASSWORD).await
    }

    /// Create an identity through the API and grant it `capabilities`.
    pub async fn create_user(
        &self,
        admin_token: &str,
        user_id: &str,
        password: &str,
        capabilities: &[&str],
    ) {
        let reply = self
            .request(
                Method::POST,
                "/users",
                Some(admin_token),
                Some(serde_json::json!({
                    "user_id": user_id,
                    "password": password,
                    "full_name": format!("{} test", user_id),
                })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);

        for capability in capabilities {
            let reply = self
                .request(
                    Method::POST,
                    &format!("/users/{}/permissions/{}", user_id, capability),
                    Some(admin_token),
                    None,
                )
                .await;
            assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        }
    }
}

pub fn temp_log_file(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.log");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}
