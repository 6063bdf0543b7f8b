// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP-level tests of the router.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use roster_server::api::router;
use roster_server::auth::{BcryptHasher, OverridePolicy, PasswordHasher, Role};
use roster_server::config::Settings;
use roster_server::state::AppState;
use roster_server::storage::{Account, AccountRepository, InMemoryAccountRepository};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JWKS_JSON: &str = include_str!("fixtures/jwks.json");
const PRIVATE_KEY_PEM: &str = include_str!("fixtures/federated_rsa_private.pem");
const AUDIENCE: &str = "api://roster";
const ISSUER: &str = "https://login.example.com/tenant-1/v2.0";

struct TestApp {
    router: Router,
    state: AppState,
    accounts: Arc<InMemoryAccountRepository>,
}

async fn app_with(extra: &[(&str, &str)]) -> TestApp {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("SECRET_KEY".into(), "integration-secret".into());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    let settings = Settings::from_vars(&vars).unwrap();

    let hasher = BcryptHasher::new(4);
    let accounts = Arc::new(InMemoryAccountRepository::new());
    let digest = hasher.hash("correct-password").unwrap();
    accounts
        .create(&Account::new_local("admin", "Administrator", Some(digest), Role::Admin))
        .await
        .unwrap();

    let state = AppState::from_settings(
        &settings,
        accounts.clone(),
        OverridePolicy::new(),
        Arc::new(hasher),
    )
    .unwrap();

    TestApp {
        router: router(state.clone()),
        state,
        accounts,
    }
}

async fn federated_app(server: &MockServer, scopes: &str) -> TestApp {
    let jwks_url = format!("{}/keys", server.uri());
    app_with(&[
        ("OIDC_JWKS_URL", jwks_url.as_str()),
        ("OIDC_AUDIENCE", AUDIENCE),
        ("OIDC_ISSUER", ISSUER),
        ("OIDC_REQUIRED_SCOPES", scopes),
    ])
    .await
}

async fn jwks_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS_JSON, "application/json"))
        .mount(&server)
        .await;
    server
}

fn federated_token(oid: &str, email: &str, scp: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "oid": oid,
        "tid": "tenant-1",
        "preferred_username": email,
        "name": "Federated Person",
        "scp": scp,
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 3600,
    });
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("test-key-1".into());
    encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(PRIVATE_KEY_PEM.as_bytes()).unwrap(),
    )
    .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, header::HeaderMap, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={username}&password={password}")))
        .unwrap()
}

#[tokio::test]
async fn password_login_then_current_user() {
    let app = app_with(&[]).await;

    let (status, _, body) = send(&app.router, login_request("admin", "correct-password")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 1800);
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, _, me) = send(&app.router, get_with_token("/v1/users/me", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "admin");
    assert_eq!(me["role"], "admin");
    assert_eq!(me["auth_method"], "local");
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() {
    let app = app_with(&[]).await;

    let (status, headers, body) = send(&app.router, login_request("admin", "nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(body["error"], "Incorrect username or password");

    let (status, _, unknown) = send(&app.router, login_request("ghost", "nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, body);
}

#[tokio::test]
async fn disabled_account_cannot_log_in() {
    let app = app_with(&[]).await;
    let mut admin = app.accounts.find_by_username("admin").await.unwrap().unwrap();
    admin.is_disabled = true;
    app.accounts.update(&admin).await.unwrap();

    let (status, _, _) = send(&app.router, login_request("admin", "correct-password")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn current_user_requires_bearer_token() {
    let app = app_with(&[]).await;

    let request = Request::builder()
        .uri("/v1/users/me")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(body["error_code"], "missing_auth_header");

    let (status, _, body) = send(&app.router, get_with_token("/v1/users/me", "a.b.c")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["error"],
        "Could not validate credentials (tried both local JWT and OIDC)"
    );
}

#[tokio::test]
async fn health_endpoints() {
    let app = app_with(&[]).await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, headers, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(headers.contains_key("x-request-id"));

    let request = Request::builder()
        .uri("/health/ready")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["storage"], "ok");
    assert!(body["checks"].get("jwks").is_none());
}

#[tokio::test]
async fn readiness_reports_unreachable_key_set() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let app = federated_app(&server, "").await;

    let request = Request::builder()
        .uri("/health/ready")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["jwks"], "unavailable");
}

fn ready_request() -> Request<Body> {
    Request::builder()
        .uri("/health/ready")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn readiness_stays_up_while_serving_expired_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS_JSON, "application/json"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let app = federated_app(&server, "").await;

    let (status, _, body) = send(&app.router, ready_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["jwks"], "ok");

    app.state.jwks().unwrap().mark_stale();

    let token = federated_token("stale-oid", "stale@org.se", "api.read");
    let (status, _, _) = send(&app.router, get_with_token("/v1/users/me", &token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(&app.router, ready_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["jwks"], "stale");
}

#[tokio::test]
async fn inspect_reports_unverified_contents() {
    let app = app_with(&[]).await;
    let token = federated_token("oid-1", "anna@org.se", "api.read");

    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/inspect")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "token": token }).to_string()))
        .unwrap();
    let (status, _, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "federated");
    assert_eq!(body["algorithm"], "RS256");
    assert_eq!(body["issuer"], ISSUER);
    // Inspection never provisions anyone.
    assert_eq!(app.accounts.len().await, 1);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/inspect")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "token": "not-a-token" }).to_string()))
        .unwrap();
    let (status, _, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn federated_token_provisions_and_resolves() {
    let server = jwks_server().await;
    let app = federated_app(&server, "api.read").await;
    let token = federated_token("xyz", "new@org.se", "api.read");

    let (status, _, me) = send(&app.router, get_with_token("/v1/users/me", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "new@org.se");
    assert_eq!(me["role"], "staff");
    assert_eq!(me["unit_id"], "u3");
    assert_eq!(me["auth_method"], "federated");

    let (status, _, again) = send(&app.router, get_with_token("/v1/oidc/me", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["id"], me["id"]);
    // The seeded admin plus the provisioned account.
    assert_eq!(app.accounts.len().await, 2);
}

#[tokio::test]
async fn missing_scope_is_forbidden() {
    let server = jwks_server().await;
    let app = federated_app(&server, "api.read").await;
    let token = federated_token("xyz", "new@org.se", "api.write");

    let (status, headers, body) = send(&app.router, get_with_token("/v1/users/me", &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!headers.contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(body["error"], "Missing required scope");
    assert!(app
        .accounts
        .find_by_federated_id("xyz")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn federated_only_endpoint_rejects_local_tokens() {
    let server = jwks_server().await;
    let app = federated_app(&server, "").await;

    let (_, _, body) = send(&app.router, login_request("admin", "correct-password")).await;
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, _, body) = send(&app.router, get_with_token("/v1/oidc/me", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid federated token");
}
