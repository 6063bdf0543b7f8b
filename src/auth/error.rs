// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::StorageError;

/// Authentication error type.
///
/// Every variant maps to exactly one of 401 or 403 except `JwksFetchError`
/// and `InternalError`, which the hybrid authenticator never surfaces
/// directly (they collapse into `Unauthenticated`).
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Token is malformed
    MalformedToken,
    /// Token header has no kid, or no key in the key set matches it
    UnknownKey,
    /// Token signature is invalid
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// Token is not yet valid
    TokenNotYetValid,
    /// Token audience does not match the configured audience
    AudienceMismatch,
    /// Token issuer is not in the configured allow-list
    IssuerNotAllowed,
    /// Token carries neither `oid` nor `sub`
    MissingIdentityClaim,
    /// None of the required scopes are present
    MissingScope,
    /// Account is disabled
    AccountDisabled,
    /// Account already records a different federated tenant
    TenantMismatch,
    /// Email or username already linked to another federated identity
    IdentityConflict(String),
    /// Username/password login rejected
    InvalidCredentials,
    /// Generic rejection after every mechanism was tried
    Unauthenticated(String),
    /// Role check failed
    InsufficientPermissions,
    /// JWKS fetch failed and nothing was cached
    JwksFetchError(String),
    /// Internal error
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnknownKey => "unknown_key",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::IssuerNotAllowed => "issuer_not_allowed",
            AuthError::MissingIdentityClaim => "missing_identity_claim",
            AuthError::MissingScope => "missing_scope",
            AuthError::AccountDisabled => "account_disabled",
            AuthError::TenantMismatch => "tenant_mismatch",
            AuthError::IdentityConflict(_) => "identity_conflict",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Unauthenticated(_) => "unauthenticated",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::JwksFetchError(_) => "jwks_fetch_error",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::UnknownKey
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::TokenNotYetValid
            | AuthError::AudienceMismatch
            | AuthError::IssuerNotAllowed
            | AuthError::MissingIdentityClaim
            | AuthError::TenantMismatch
            | AuthError::IdentityConflict(_)
            | AuthError::InvalidCredentials
            | AuthError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AuthError::MissingScope
            | AuthError::AccountDisabled
            | AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::JwksFetchError(_) | AuthError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether this error is a deliberate decision about the caller rather
    /// than a token that simply failed to verify.
    ///
    /// Explicit errors are propagated as-is by the hybrid authenticator;
    /// everything else is folded into a single `Unauthenticated` verdict.
    pub fn is_explicit(&self) -> bool {
        matches!(
            self,
            AuthError::IssuerNotAllowed
                | AuthError::MissingIdentityClaim
                | AuthError::MissingScope
                | AuthError::AccountDisabled
                | AuthError::TenantMismatch
                | AuthError::IdentityConflict(_)
                | AuthError::InsufficientPermissions
        )
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::UnknownKey => write!(f, "No signing key matches the token"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenNotYetValid => write!(f, "Token is not yet valid"),
            AuthError::AudienceMismatch => write!(f, "Token audience is invalid"),
            AuthError::IssuerNotAllowed => write!(f, "Invalid issuer"),
            AuthError::MissingIdentityClaim => write!(f, "Token missing oid/sub"),
            AuthError::MissingScope => write!(f, "Missing required scope"),
            AuthError::AccountDisabled => write!(f, "User is disabled"),
            AuthError::TenantMismatch => write!(f, "Tenant mismatch"),
            AuthError::IdentityConflict(msg) => write!(f, "{msg}"),
            AuthError::InvalidCredentials => write!(f, "Incorrect username or password"),
            AuthError::Unauthenticated(msg) => write!(f, "{msg}"),
            AuthError::InsufficientPermissions => {
                write!(f, "Insufficient permissions for this operation")
            }
            AuthError::JwksFetchError(msg) => write!(f, "Failed to fetch JWKS: {msg}"),
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        AuthError::InternalError(format!("account storage: {e}"))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
