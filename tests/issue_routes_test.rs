// ABOUTME: Integration tests for the issuance and claims preview HTTP endpoints
// ABOUTME: Exercises token encoding, claim merge order, required values, and header projection

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tokensmith::config::{Options, Value};
use tokensmith::keys::{Descriptor, KeyType, Registry};
use tokensmith::noncer::UrlSafeNoncer;
use tokensmith::routes::{IssueRoutes, IssueState, KeyRoutes};
use tower::ServiceExt;

fn issuer_options() -> Options {
    Options {
        alg: Some("HS256".to_owned()),
        key: Descriptor {
            kid: "issuer".to_owned(),
            kind: KeyType::Secret,
            bits: 64,
            file: None,
        },
        claims: vec![
            Value {
                key: "a".to_owned(),
                parameter: Some("a".to_owned()),
                ..Value::default()
            },
            Value {
                key: "a".to_owned(),
                value: Some(serde_json::json!(2)),
                ..Value::default()
            },
            Value {
                key: "device".to_owned(),
                header: Some("X-Device".to_owned()),
                required: true,
                ..Value::default()
            },
        ],
        nonce: true,
        duration: Some(Duration::from_secs(3600)),
        ..Options::default()
    }
}

fn app(options: &Options) -> (axum::Router, Arc<Registry>) {
    let registry = Arc::new(Registry::new());
    let state = IssueState::new(
        options,
        &registry,
        Arc::new(UrlSafeNoncer::default()),
        reqwest::Client::new(),
    )
    .unwrap();

    let router = axum::Router::new()
        .merge(IssueRoutes::routes(Arc::new(state)))
        .merge(KeyRoutes::routes(Arc::clone(&registry)));
    (router, registry)
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

fn decode_payload(token: &str) -> serde_json::Value {
    let segment = token.split('.').nth(1).unwrap();
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
}

#[tokio::test]
async fn test_issue_returns_signed_token() {
    let (app, _registry) = app(&issuer_options());

    let response = app
        .oneshot(
            Request::get("/issue?a=1")
                .header("X-Device", "mac:112233445566")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/jose"
    );
    // The device claim is projected into the configured response header
    assert_eq!(
        response.headers().get("X-Device").unwrap(),
        "mac:112233445566"
    );

    let token = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(token.split('.').count(), 3);

    let claims = decode_payload(&token);
    // Static claims override caller-supplied parameters
    assert_eq!(claims["a"], 2);
    assert_eq!(claims["device"], "mac:112233445566");
    assert!(claims["jti"].is_string());

    let iat = claims["iat"].as_i64().unwrap();
    let exp = claims["exp"].as_i64().unwrap();
    assert_eq!(exp - iat, 3600);
}

#[tokio::test]
async fn test_issue_accepts_form_posts() {
    let (app, _registry) = app(&issuer_options());

    let response = app
        .oneshot(
            Request::post("/issue")
                .header("X-Device", "mac:112233445566")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("a=9"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let token = String::from_utf8(body_bytes(response).await).unwrap();
    let claims = decode_payload(&token);
    assert_eq!(claims["a"], 2);
}

#[tokio::test]
async fn test_missing_required_header_is_bad_request() {
    let (app, _registry) = app(&issuer_options());

    let response = app
        .oneshot(Request::get("/issue").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"]["code"], "MISSING_VALUE");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("X-Device"));
}

#[tokio::test]
async fn test_claims_preview_never_signs() {
    let (app, _registry) = app(&issuer_options());

    let response = app
        .oneshot(
            Request::get("/claims?a=1")
                .header("X-Device", "mac:112233445566")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));

    let claims: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(claims["a"], 2);
    assert_eq!(claims["device"], "mac:112233445566");
    assert!(claims["jti"].is_string());
}

#[tokio::test]
async fn test_two_tokens_differ_but_both_decode() {
    let (app, _registry) = app(&issuer_options());

    let mut tokens = Vec::new();
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::get("/issue")
                    .header("X-Device", "mac:112233445566")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        tokens.push(String::from_utf8(body_bytes(response).await).unwrap());
    }

    assert_ne!(tokens[0], tokens[1]);
    for token in &tokens {
        let claims = decode_payload(token);
        assert_eq!(claims["device"], "mac:112233445566");
    }
}

#[tokio::test]
async fn test_public_key_endpoints() {
    let (app, _registry) = app(&issuer_options());

    let response = app
        .clone()
        .oneshot(Request::get("/keys/issuer").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-pem-file"
    );
    let pem = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));

    let response = app
        .clone()
        .oneshot(
            Request::get("/keys/issuer/key.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let jwk: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(jwk["kty"], "oct");
    assert_eq!(jwk["kid"], "issuer");

    let response = app
        .clone()
        .oneshot(Request::get("/keys/unknown").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(Request::get("/keys").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let key_set: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(key_set["keys"].as_array().unwrap().len(), 1);
}
