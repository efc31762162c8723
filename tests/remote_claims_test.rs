// ABOUTME: Integration tests for the remote claims builder against a live local endpoint
// ABOUTME: Verifies metadata forwarding, merge semantics, and failure atomicity

use axum::extract::Json;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokensmith::claims::{ClaimBuilders, ClaimMap};
use tokensmith::config::{Options, RemoteOptions, Value};
use tokensmith::noncer::UrlSafeNoncer;
use tokensmith::request::Request;

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn remote_options(addr: SocketAddr, metadata: Vec<Value>) -> Options {
    Options {
        metadata,
        disable_time: true,
        remote: Some(RemoteOptions {
            method: None,
            url: format!("http://{addr}/claims"),
        }),
        ..Options::default()
    }
}

fn builders(options: &Options) -> ClaimBuilders {
    ClaimBuilders::new(
        options,
        Arc::new(UrlSafeNoncer::default()),
        reqwest::Client::new(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_remote_claims_merge_into_target() {
    let addr = serve(Router::new().route(
        "/claims",
        post(|| async { Json(serde_json::json!({ "trust": 1000, "partner": "comcast" })) }),
    ))
    .await;

    let options = remote_options(addr, Vec::new());
    let mut target = ClaimMap::new();
    builders(&options)
        .add_claims(&Request::new(), &mut target)
        .await
        .unwrap();

    assert_eq!(target["trust"], 1000);
    assert_eq!(target["partner"], "comcast");
}

#[tokio::test]
async fn test_remote_receives_static_and_request_metadata() {
    // Echo the received metadata back as claims so the test can observe it
    let addr = serve(Router::new().route(
        "/claims",
        post(|Json(body): Json<serde_json::Value>| async move { Json(body) }),
    ))
    .await;

    let static_metadata = vec![Value {
        key: "tier".to_owned(),
        value: Some(serde_json::json!("gold")),
        ..Value::default()
    }];
    let options = remote_options(addr, static_metadata);

    let mut request = Request::new();
    request
        .metadata
        .insert("serial".to_owned(), serde_json::json!("abc123"));
    // Request metadata wins over the statically configured entry
    request
        .metadata
        .insert("tier".to_owned(), serde_json::json!("platinum"));

    let mut target = ClaimMap::new();
    builders(&options)
        .add_claims(&request, &mut target)
        .await
        .unwrap();

    assert_eq!(target["serial"], "abc123");
    assert_eq!(target["tier"], "platinum");
}

#[tokio::test]
async fn test_remote_failure_leaves_target_untouched() {
    let addr = serve(Router::new().route(
        "/claims",
        post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    ))
    .await;

    let options = remote_options(addr, Vec::new());

    let mut request = Request::new();
    request
        .claims
        .insert("base".to_owned(), serde_json::json!("kept"));

    let mut target = ClaimMap::new();
    let error = builders(&options)
        .add_claims(&request, &mut target)
        .await
        .unwrap_err();

    assert_eq!(error.code, tokensmith::errors::ErrorCode::RemoteClaimsError);
    assert_eq!(error.details["status"], 503);
    assert!(error.details["url"].as_str().unwrap().contains("/claims"));

    // The request-copy stage ran; the failed remote stage wrote nothing
    assert_eq!(target.len(), 1);
    assert_eq!(target["base"], "kept");
}

#[tokio::test]
async fn test_empty_remote_body_contributes_no_claims() {
    let addr = serve(Router::new().route("/claims", post(|| async { StatusCode::OK }))).await;

    let options = remote_options(addr, Vec::new());
    let mut target = ClaimMap::new();
    builders(&options)
        .add_claims(&Request::new(), &mut target)
        .await
        .unwrap();

    assert!(target.is_empty());
}

#[tokio::test]
async fn test_non_object_remote_body_rejected() {
    let addr = serve(Router::new().route(
        "/claims",
        post(|| async { Json(serde_json::json!(["not", "an", "object"])) }),
    ))
    .await;

    let options = remote_options(addr, Vec::new());
    let mut target = ClaimMap::new();
    let error = builders(&options)
        .add_claims(&Request::new(), &mut target)
        .await
        .unwrap_err();

    assert!(error.message.contains("JSON object"));
    assert!(target.is_empty());
}
