// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive
//! `ToSchema` for OpenAPI documentation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::UnverifiedToken;

// =============================================================================
// Login
// =============================================================================

/// Form body of `POST /token`.
#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

impl TokenResponse {
    pub fn bearer(access_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            expires_in,
        }
    }
}

// =============================================================================
// Token inspection
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct InspectRequest {
    pub token: String,
}

/// Unverified view of a token. Never proof of identity.
#[derive(Debug, Serialize, ToSchema)]
pub struct InspectResponse {
    /// `local` for HMAC-signed tokens, otherwise `federated`
    pub kind: String,
    #[serde(flatten)]
    pub token: UnverifiedToken,
}

impl From<UnverifiedToken> for InspectResponse {
    fn from(token: UnverifiedToken) -> Self {
        let kind = if token.looks_local() { "local" } else { "federated" };
        Self {
            kind: kind.to_string(),
            token,
        }
    }
}
