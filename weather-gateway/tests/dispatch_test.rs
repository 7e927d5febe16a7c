mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;
use weather_gateway::{models::OperationResult, services::EngineCall};

async fn app_with_user(capabilities: &[&str]) -> (TestApp, String) {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    app.create_user(&admin, "alice", "alice-password", capabilities)
        .await;
    let token = app.login("alice", "alice-password").await;
    (app, token)
}

#[tokio::test]
async fn forecast_returns_engine_payload_unchanged() {
    let (app, token) = app_with_user(&["forecasting"]).await;
    app.engine.set_reply(OperationResult::success(
        json!({ "city": "margaux", "temperature": [14.2, 15.0, 13.8] }),
    ));

    let reply = app
        .request(Method::POST, "/forecast/Margaux", Some(&token), None)
        .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.body,
        json!({ "city": "margaux", "temperature": [14.2, 15.0, 13.8] })
    );
    assert!(matches!(
        app.engine.calls().as_slice(),
        [EngineCall::Forecast(city)] if city.as_str() == "margaux"
    ));
}

#[tokio::test]
async fn engine_failure_surfaces_its_message() {
    let (app, token) = app_with_user(&["data_ingestion"]).await;
    app.engine
        .set_reply(OperationResult::failure("weather provider quota exceeded"));

    let reply = app
        .request(Method::POST, "/weather/refresh", Some(&token), None)
        .await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body["error"], "weather provider quota exceeded");
}

#[tokio::test]
async fn train_sweep_forwards_both_configurations() {
    let (app, token) = app_with_user(&["training"]).await;
    app.engine
        .set_reply(OperationResult::success(json!({ "sweep_id": "sw-1" })));

    let reply = app
        .request(
            Method::POST,
            "/train-sweep/margaux?train_label=exp1",
            Some(&token),
            Some(json!({
                "cfgA": { "n_epochs": 10, "batch_size": 32, "learning_rate": 0.01 },
                "cfgB": { "n_epochs": 20, "batch_size": 64, "learning_rate": 0.001 }
            })),
        )
        .await;

    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body, json!({ "sweep_id": "sw-1" }));

    let calls = app.engine.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        EngineCall::TrainMany {
            city,
            label,
            params_by_id,
        } => {
            assert_eq!(city.as_str(), "margaux");
            assert_eq!(label, "exp1");
            assert_eq!(
                params_by_id.keys().collect::<Vec<_>>(),
                vec!["cfgA", "cfgB"]
            );
            assert_eq!(params_by_id["cfgB"].n_epochs, 20);
        }
        other => panic!("unexpected engine call: {:?}", other),
    }
}

#[tokio::test]
async fn train_and_retrain_forward_their_inputs() {
    let (app, token) = app_with_user(&["training"]).await;

    let reply = app
        .request(
            Method::POST,
            "/train/margaux?train_label=baseline",
            Some(&token),
            Some(json!({
                "n_epochs": 5,
                "batch_size": 16,
                "learning_rate": 0.005,
                "dropout": 0.1
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let reply = app
        .request(Method::POST, "/retrain/margaux?n_epochs=3", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let calls = app.engine.calls();
    assert!(matches!(
        &calls[0],
        EngineCall::TrainOne { label, params, .. }
            if label == "baseline" && params.extra.get("dropout") == Some(&json!(0.1))
    ));
    assert!(matches!(
        &calls[1],
        EngineCall::Retrain { n_epochs: 3, .. }
    ));
}

#[tokio::test]
async fn missing_capability_is_forbidden_and_engine_untouched() {
    let (app, token) = app_with_user(&["forecasting"]).await;

    let requests = [
        (Method::POST, "/weather/historical"),
        (Method::POST, "/weather/refresh"),
        (Method::DELETE, "/weather"),
        (Method::POST, "/retrain/margaux?n_epochs=2"),
    ];
    for (method, uri) in requests {
        let reply = app.request(method, uri, Some(&token), None).await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN, "{}", uri);
    }

    assert!(app.engine.calls().is_empty());
}

#[tokio::test]
async fn invalid_job_input_is_rejected_before_dispatch() {
    let (app, token) = app_with_user(&["training", "forecasting"]).await;

    let reply = app
        .request(Method::POST, "/forecast/bad%20city!", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);

    let reply = app
        .request(
            Method::POST,
            "/train/margaux?train_label=exp",
            Some(&token),
            Some(json!({ "n_epochs": 0, "batch_size": 16, "learning_rate": 0.01 })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);

    let reply = app
        .request(
            Method::POST,
            "/train-sweep/margaux?train_label=exp",
            Some(&token),
            Some(json!({})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);

    assert!(app.engine.calls().is_empty());
}

#[tokio::test]
async fn missing_capability_wins_over_invalid_input() {
    let (app, token) = app_with_user(&["data_ingestion"]).await;

    let reply = app
        .request(Method::POST, "/forecast/bad%20city!", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN, "{}", reply.body);

    let reply = app
        .request(
            Method::POST,
            "/train/bad%20city!?train_label=exp",
            Some(&token),
            Some(json!({ "n_epochs": 0, "batch_size": 16, "learning_rate": 0.01 })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN, "{}", reply.body);

    let reply = app
        .request(
            Method::POST,
            "/train-sweep/margaux?train_label=exp",
            Some(&token),
            Some(json!({})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN, "{}", reply.body);

    // Missing query and body are not inspected for a refused caller either.
    let reply = app
        .request(Method::POST, "/train-sweep/margaux", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN, "{}", reply.body);

    let reply = app
        .request(Method::POST, "/retrain/margaux?n_epochs=lots", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN, "{}", reply.body);

    assert!(app.engine.calls().is_empty());
}

#[tokio::test]
async fn malformed_job_input_is_unprocessable_for_authorized_callers() {
    let (app, token) = app_with_user(&["training"]).await;

    let reply = app
        .request(Method::POST, "/train-sweep/margaux", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY, "{}", reply.body);

    let reply = app
        .request(Method::POST, "/retrain/margaux?n_epochs=lots", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY, "{}", reply.body);

    assert!(app.engine.calls().is_empty());
}

#[tokio::test]
async fn data_operations_reach_the_data_engine() {
    let (app, token) = app_with_user(&["data_ingestion"]).await;

    for (method, uri) in [
        (Method::POST, "/weather/historical"),
        (Method::POST, "/weather/refresh"),
        (Method::DELETE, "/weather"),
    ] {
        let reply = app.request(method, uri, Some(&token), None).await;
        assert_eq!(reply.status, StatusCode::OK, "{}", uri);
    }

    assert_eq!(
        app.engine.calls(),
        vec![
            EngineCall::IngestHistorical,
            EngineCall::RefreshCurrent,
            EngineCall::PurgeAll
        ]
    );
}
