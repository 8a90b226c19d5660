//! HTTP transport tests.
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use authorizer_service::auth::Authenticator;
use authorizer_service::config::Config;
use authorizer_service::routes::{build_routes, AppState};
use authorizer_test_utils::{
    MockJwksServer, TestKeypair, TestTokenBuilder, TEST_AUDIENCE, TEST_ISSUER, TEST_RESOURCE,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

fn app(jwks_uri: &str) -> Router {
    let vars = HashMap::from([
        ("AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
        ("TOKEN_ISSUER".to_string(), TEST_ISSUER.to_string()),
        ("JWKS_URI".to_string(), jwks_uri.to_string()),
    ]);
    let config = Config::from_vars(&vars).unwrap();
    let state = Arc::new(AppState {
        authenticator: Authenticator::from_config(&config).unwrap(),
    });

    // Local recorder handle; nothing is installed globally
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
    build_routes(state, metrics_handle)
}

fn authorize_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/authorize")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_authorize_allows_valid_token() {
    let keypair = TestKeypair::new(1, "key-1");
    let jwks = MockJwksServer::with_keys(&[&keypair]).await;
    let token = keypair.sign_token(&TestTokenBuilder::new().for_user("alice").build());

    let body = json!({
        "type": "TOKEN",
        "authorizationToken": format!("Bearer {token}"),
        "methodArn": TEST_RESOURCE
    });
    let response = app(&jwks.jwks_uri())
        .oneshot(authorize_request(body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["principalId"], "alice");
    assert_eq!(json["policyDocument"]["Statement"][0]["Effect"], "Allow");
    assert_eq!(json["policyDocument"]["Statement"][0]["Resource"], TEST_RESOURCE);
}

#[tokio::test]
async fn test_authorize_rejection_is_opaque() {
    let keypair = TestKeypair::new(1, "key-1");
    let jwks = MockJwksServer::with_keys(&[&keypair]).await;
    let expired = keypair.sign_token(&TestTokenBuilder::new().expires_in(-3600).build());

    let bodies = [
        json!({"type": "TOKEN", "authorizationToken": "Basic abc", "methodArn": TEST_RESOURCE})
            .to_string(),
        json!({"type": "TOKEN", "authorizationToken": format!("Bearer {expired}"), "methodArn": TEST_RESOURCE})
            .to_string(),
        "not json at all".to_string(),
    ];

    let app = app(&jwks.jwks_uri());
    for body in bodies {
        let response = app.clone().oneshot(authorize_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({"message": "Unauthorized"}));
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let jwks = MockJwksServer::start().await;

    let response = app(&jwks.jwks_uri())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let jwks = MockJwksServer::start().await;

    let response = app(&jwks.jwks_uri())
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
