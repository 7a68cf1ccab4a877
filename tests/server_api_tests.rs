/// Integration tests for the HTTP surface of the storage server
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use metrics_keeper::{
    handlers::AppState,
    security::{compression::gzip, Decrypter, Encrypter, Signer, SIGNATURE_HEADER},
    server::{create_router, ServerSecurity},
    service::MetricService,
    storage::{MemoryStore, Repository},
    transport::{ChainOptions, TransportChain},
};
use rsa::rand_core::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn app_with(security: ServerSecurity) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = Arc::new(MetricService::new(store.clone()));
    (create_router(AppState::new(service), security), store)
}

fn app() -> (Router, Arc<MemoryStore>) {
    app_with(ServerSecurity::default())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::body::Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body)
}

#[tokio::test]
async fn test_sequential_counter_updates_accumulate() {
    let (app, _) = app();

    for _ in 0..3 {
        let (status, _) = send(
            &app,
            post_json("/update", json!({"id": "PollCount", "type": "counter", "delta": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, get("/value/counter/PollCount")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"3");
}

#[tokio::test]
async fn test_batch_with_repeated_counter_is_summed() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        post_json(
            "/updates",
            json!([
                {"id": "X", "type": "counter", "delta": 5},
                {"id": "X", "type": "counter", "delta": 7},
                {"id": "Alloc", "type": "gauge", "value": 1.5}
            ]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let merged: Value = serde_json::from_slice(&body).unwrap();
    let merged = merged.as_array().unwrap();
    assert_eq!(merged.len(), 2);
    assert!(merged.contains(&json!({"id": "X", "type": "counter", "delta": 12})));

    let (_, body) = send(&app, get("/value/counter/X")).await;
    assert_eq!(&body[..], b"12");
}

#[tokio::test]
async fn test_gauge_is_replaced() {
    let (app, _) = app();

    send(&app, post_json("/update", json!({"id": "Alloc", "type": "gauge", "value": 100.0}))).await;
    let (status, body) = send(
        &app,
        post_json("/update", json!({"id": "Alloc", "type": "gauge", "value": 55.6})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let merged: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(merged["value"], json!(55.6));

    let (_, body) = send(&app, get("/value/gauge/Alloc")).await;
    assert_eq!(&body[..], b"55.6");
}

#[tokio::test]
async fn test_unknown_kind_is_rejected_and_store_unchanged() {
    let (app, store) = app();

    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/update/histogram/Latency/1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"]["type"], "validation_error");

    let (status, _) = send(
        &app,
        post_json("/update", json!({"id": "Latency", "type": "histogram", "value": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(store.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_entry_rejects_whole_batch() {
    let (app, store) = app();

    let (status, _) = send(
        &app,
        post_json(
            "/updates",
            json!([
                {"id": "PollCount", "type": "counter", "delta": 1},
                {"id": "Alloc", "type": "gauge"}
            ]),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_metric_with_both_payload_fields_is_rejected() {
    let (app, store) = app();

    let (status, body) = send(
        &app,
        post_json(
            "/update",
            json!({"id": "Alloc", "type": "gauge", "delta": 3, "value": 1.5}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"]["type"], "validation_error");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_malformed_literal_is_bad_request() {
    let (app, _) = app();

    let request = Request::builder()
        .method("POST")
        .uri("/update/counter/PollCount/1.5")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_value_lookups() {
    let (app, _) = app();
    send(&app, post_json("/update", json!({"id": "Alloc", "type": "gauge", "value": 2.5}))).await;

    let (status, body) = send(&app, post_json("/value", json!({"id": "Alloc", "type": "gauge"}))).await;
    assert_eq!(status, StatusCode::OK);
    let metric: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(metric, json!({"id": "Alloc", "type": "gauge", "value": 2.5}));

    let (status, _) = send(&app, post_json("/value", json!({"id": "Missing", "type": "gauge"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Same id, other kind
    let (status, _) = send(&app, get("/value/counter/Alloc")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/value/histogram/Alloc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_all_is_sorted() {
    let (app, _) = app();
    for id in ["Zeta", "Alpha", "Mid"] {
        send(&app, post_json("/update", json!({"id": id, "type": "gauge", "value": 1.0}))).await;
    }

    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    let all: Vec<Value> = serde_json::from_slice(&body).unwrap();
    let ids: Vec<&str> = all.iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["Alpha", "Mid", "Zeta"]);
}

#[tokio::test]
async fn test_ping_and_health() {
    let (app, _) = app();

    let (status, body) = send(&app, get("/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"pong");

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn test_gzip_request_body_is_decompressed() {
    let (app, _) = app();
    let body = json!({"id": "PollCount", "type": "counter", "delta": 4}).to_string();

    let request = Request::builder()
        .method("POST")
        .uri("/update")
        .header("Content-Type", "application/json")
        .header("Content-Encoding", "gzip")
        .body(Body::from(gzip(body.as_bytes()).unwrap()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/value/counter/PollCount")).await;
    assert_eq!(&body[..], b"4");
}

#[tokio::test]
async fn test_signed_request_and_signed_response() {
    let signer = Signer::new("shared-secret");
    let (app, _) = app_with(ServerSecurity {
        signer: Some(signer.clone()),
        decrypter: None,
    });

    let body = json!({"id": "Alloc", "type": "gauge", "value": 9.5}).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/update")
        .header(SIGNATURE_HEADER, signer.sign(body.as_bytes()))
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let signature = response.headers()[SIGNATURE_HEADER]
        .to_str()
        .unwrap()
        .to_string();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(signer.verify(&body, &signature).is_ok());
}

#[tokio::test]
async fn test_tampered_body_is_rejected_before_storage() {
    let signer = Signer::new("shared-secret");
    let (app, store) = app_with(ServerSecurity {
        signer: Some(signer.clone()),
        decrypter: None,
    });

    let original = json!({"id": "Alloc", "type": "gauge", "value": 9.5}).to_string();
    let tampered = json!({"id": "Alloc", "type": "gauge", "value": 9.6}).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/update")
        .header(SIGNATURE_HEADER, signer.sign(original.as_bytes()))
        .body(Body::from(tampered))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"]["type"], "integrity_error");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_full_envelope_from_transport_chain() {
    let private = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
    let public = RsaPublicKey::from(&private);
    let signer = Signer::new("shared-secret");

    let (app, _) = app_with(ServerSecurity {
        signer: Some(signer.clone()),
        decrypter: Some(Arc::new(Decrypter::new(private))),
    });

    let chain = TransportChain::new(
        reqwest::Client::new(),
        ChainOptions {
            signer: Some(signer),
            encrypter: Some(Encrypter::new(public)),
            ..ChainOptions::default()
        },
        CancellationToken::new(),
    );
    let payload = json!([
        {"id": "PollCount", "type": "counter", "delta": 2},
        {"id": "RandomValue", "type": "gauge", "value": 0.25}
    ]);
    let prepared = chain
        .prepare("http://localhost/updates", payload.to_string().into_bytes())
        .unwrap();

    let mut request = Request::builder().method("POST").uri("/updates");
    for (name, value) in prepared.headers.iter() {
        request = request.header(name, value);
    }
    let (status, _) = send(&app, request.body(Body::from(prepared.body)).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/value/counter/PollCount")).await;
    assert_eq!(&body[..], b"2");
}
