#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use common::*;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;
use webhook_dispatch::{
    delivery_logs::append_log,
    dispatcher::{Dispatcher, DispatcherConfig, HttpExecutor, NewDeliveryLog, SqliteStore},
    routes::app,
    state::AppState,
    types::DeliveryLogStatus,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const API_TOKEN: &str = "back-office-token";

fn build_app(db: &TestDb, api_token: Option<&str>) -> Router {
    let store = Arc::new(SqliteStore::new(db.pool.clone()));
    let executor = Arc::new(HttpExecutor::new("webhook-dispatch-test", 1_000).unwrap());
    let config = DispatcherConfig {
        backoff_base_ms: 10,
        ..DispatcherConfig::default()
    };

    app(AppState {
        pool: db.pool.clone(),
        dispatcher: Dispatcher::new(store.clone(), store, executor, config),
        api_token: api_token.map(str::to_string),
    })
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    respond(app, builder.body(body).unwrap()).await
}

async fn respond(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

fn create_body(owner: Uuid, url: &str, events: &[&str]) -> Value {
    json!({
        "owner_id": owner,
        "name": "Zapier bridge",
        "url": url,
        "secret": SECRET,
        "events": events,
    })
}

#[tokio::test]
async fn webhook_crud_round_trip() {
    let db = setup_db().await;
    let app = build_app(&db, None);
    let owner = Uuid::new_v4();

    let (status, created) = send(
        &app,
        Method::POST,
        "/webhooks",
        Some(create_body(
            owner,
            "https://hooks.example.com/zap",
            &["client.created", " client.created ", "payment.received"],
        )),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created.get("secret").is_none());
    assert_eq!(created["owner_id"], json!(owner));
    assert_eq!(created["is_active"], json!(true));
    assert_eq!(created["retry_count"], json!(3));
    assert_eq!(created["timeout_ms"], json!(5000));
    assert_eq!(
        created["events"],
        json!(["client.created", "payment.received"])
    );
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&app, Method::GET, &format!("/webhooks/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, listed) = send(
        &app,
        Method::GET,
        &format!("/webhooks?owner_id={owner}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["webhooks"].as_array().unwrap().len(), 1);

    let (_, other) = send(
        &app,
        Method::GET,
        &format!("/webhooks?owner_id={}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(other["webhooks"], json!([]));

    let (status, updated) = send(
        &app,
        Method::PATCH,
        &format!("/webhooks/{id}"),
        Some(json!({"is_active": false, "retry_count": 0, "name": "Paused bridge"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["is_active"], json!(false));
    assert_eq!(updated["retry_count"], json!(0));
    assert_eq!(updated["name"], json!("Paused bridge"));
    assert_eq!(updated["url"], created["url"]);

    let (status, _) = send(&app, Method::DELETE, &format!("/webhooks/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::GET, &format!("/webhooks/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("not_found"));

    let (status, _) = send(&app, Method::DELETE, &format!("/webhooks/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_webhooks_are_rejected() {
    let db = setup_db().await;
    let app = build_app(&db, None);
    let owner = Uuid::new_v4();

    let mut short_secret = create_body(owner, "https://hooks.example.com", &["client.created"]);
    short_secret["secret"] = json!("too-short");
    let mut bad_url = create_body(owner, "ftp://hooks.example.com", &["client.created"]);
    bad_url["name"] = json!("ftp");
    let no_events = create_body(owner, "https://hooks.example.com", &[]);
    let mut too_many_retries = create_body(owner, "https://hooks.example.com", &["client.created"]);
    too_many_retries["retry_count"] = json!(11);
    let mut tiny_timeout = create_body(owner, "https://hooks.example.com", &["client.created"]);
    tiny_timeout["timeout_ms"] = json!(999);
    let missing_field = json!({"owner_id": owner, "name": "x"});

    for body in [
        short_secret,
        bad_url,
        no_events,
        too_many_retries,
        tiny_timeout,
        missing_field,
    ] {
        let (status, error) = send(&app, Method::POST, "/webhooks", Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(error["code"], json!("validation"));
    }

    let (status, _) = send(&app, Method::GET, "/webhooks/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/webhooks", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, error) = send(
        &app,
        Method::PATCH,
        &format!("/webhooks/{}", Uuid::new_v4()),
        Some(json!({"is_active": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], json!("not_found"));
}

#[tokio::test]
async fn dispatch_endpoint_fans_out_to_subscribers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crm"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let db = setup_db().await;
    let app = build_app(&db, None);
    let owner = Uuid::new_v4();

    let (_, created) = send(
        &app,
        Method::POST,
        "/webhooks",
        Some(create_body(
            owner,
            &format!("{}/crm", server.uri()),
            &["client.created"],
        )),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/webhooks/dispatch",
        Some(json!({
            "event": "client.created",
            "payload": {"clientId": "c_9", "name": "Maria"},
            "userId": owner,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"results": [{
            "subscriptionId": created["id"],
            "success": true,
            "status": 200,
            "attempts": 1,
        }]})
    );

    let (status, body) = send(
        &app,
        Method::POST,
        "/webhooks/dispatch",
        Some(json!({"event": "meeting.created", "payload": {}, "userId": owner})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "no subscriptions"}));

    let (status, _) = send(
        &app,
        Method::POST,
        "/webhooks/dispatch",
        Some(json!({"event": "  ", "payload": {}, "userId": owner})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_endpoint_ignores_active_flag_and_event_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/paused"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .expect(1)
        .mount(&server)
        .await;

    let db = setup_db().await;
    let app = build_app(&db, None);
    let mut body = create_body(
        Uuid::new_v4(),
        &format!("{}/paused", server.uri()),
        &["client.created"],
    );
    body["is_active"] = json!(false);
    let (_, created) = send(&app, Method::POST, "/webhooks", Some(body)).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, outcome) = send(&app, Method::POST, &format!("/webhooks/{id}/test"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["success"], json!(true));
    assert_eq!(outcome["attempts"], json!(1));

    let requests = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["event"], json!("test.webhook"));
    assert_eq!(sent["data"]["message"], json!("Teste de webhook"));
    assert!(sent["data"]["timestamp"].is_string());

    let (status, page) = send(&app, Method::GET, &format!("/webhooks/{id}/logs"), None).await;
    assert_eq!(status, StatusCode::OK);
    let logs = page["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["event"], json!("test.webhook"));
    assert_eq!(logs[0]["status"], json!("success"));
    assert_eq!(logs[0]["response_body"], json!("pong"));
    assert_eq!(page["next_before"], json!(null));

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/webhooks/{}/test", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logs_are_paginated_newest_first() {
    let db = setup_db().await;
    let app = build_app(&db, None);
    let webhook_id = Uuid::new_v4();

    for attempt in 1..=5u32 {
        append_log(
            &db.pool,
            &NewDeliveryLog {
                webhook_id,
                event: "client.updated".to_string(),
                payload: json!({"n": attempt}),
                status: if attempt == 5 {
                    DeliveryLogStatus::Failed
                } else {
                    DeliveryLogStatus::Retrying
                },
                response_status: Some(500),
                response_body: Some("oops".to_string()),
                error_message: None,
                attempt_number: attempt,
            },
        )
        .await
        .unwrap();
    }
    // Another webhook's rows never leak into the page.
    append_log(
        &db.pool,
        &NewDeliveryLog {
            webhook_id: Uuid::new_v4(),
            event: "client.updated".to_string(),
            payload: json!({}),
            status: DeliveryLogStatus::Success,
            response_status: Some(200),
            response_body: None,
            error_message: None,
            attempt_number: 1,
        },
    )
    .await
    .unwrap();

    let mut seen = Vec::new();
    let mut uri = format!("/webhooks/{webhook_id}/logs?limit=2");
    loop {
        let (status, page) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        for log in page["logs"].as_array().unwrap() {
            seen.push(log["attempt_number"].as_i64().unwrap());
        }
        match page["next_before"].as_str() {
            Some(cursor) => uri = format!("/webhooks/{webhook_id}/logs?limit=2&before={cursor}"),
            None => break,
        }
    }
    assert_eq!(seen, vec![5, 4, 3, 2, 1]);

    for bad in ["limit=0", "limit=201", "before=!!!"] {
        let (status, error) = send(
            &app,
            Method::GET,
            &format!("/webhooks/{webhook_id}/logs?{bad}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
        assert_eq!(error["code"], json!("validation"));
    }
}

#[tokio::test]
async fn api_requires_bearer_token_when_configured() {
    let db = setup_db().await;
    let app = build_app(&db, Some(API_TOKEN));
    let uri = format!("/webhooks?owner_id={}", Uuid::new_v4());

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("ok"));

    let (status, error) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error["code"], json!("unauthorized"));

    let request = |token: &str| {
        Request::builder()
            .uri(&uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = respond(&app, request("wrong-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = respond(&app, request(API_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"webhooks": []}));
}
