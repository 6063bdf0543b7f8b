// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixtures shared by the auth tests: an RSA signing key published in a
//! JWKS document, and helpers to mint federated tokens with it.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const JWKS_JSON: &str = include_str!("../../tests/fixtures/jwks.json");
pub const PRIVATE_KEY_PEM: &str = include_str!("../../tests/fixtures/federated_rsa_private.pem");
pub const UNTRUSTED_KEY_PEM: &str = include_str!("../../tests/fixtures/untrusted_rsa_private.pem");

pub const KID: &str = "test-key-1";
pub const AUDIENCE: &str = "api://roster";
pub const ISSUER: &str = "https://login.example.com/tenant-1/v2.0";
pub const TENANT: &str = "tenant-1";

/// Claims for a valid federated token, one hour from expiry.
pub fn federated_claims(oid: &str, email: &str) -> Value {
    json!({
        "oid": oid,
        "sub": format!("sub-{oid}"),
        "tid": TENANT,
        "preferred_username": email,
        "name": "Federated Person",
        "scp": "api.read",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now(),
        "exp": now() + 3600,
    })
}

/// Sign with the published key.
pub fn sign_federated(claims: &Value) -> String {
    sign_with(claims, PRIVATE_KEY_PEM, Some(KID))
}

pub fn sign_with(claims: &Value, pem: &str, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

/// JWKS endpoint at `/keys`, asserting it is hit exactly `expected_calls`
/// times when the server is dropped.
pub async fn jwks_server(expected_calls: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS_JSON, "application/json"))
        .expect(expected_calls)
        .mount(&server)
        .await;
    server
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
