// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Federated identity provider token validation.
//!
//! Signature and audience are verified with jsonwebtoken against the key
//! selected by the token's `kid`. The issuer is deliberately not part of
//! that step: it is checked afterwards against the configured allow-list, so
//! the allow-list can change without touching signature verification. An
//! empty allow-list accepts any issuer whose token verifies.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Header, Validation};
use serde::Serialize;
use utoipa::ToSchema;

use super::claims::{FederatedClaims, VerifiedClaims};
use super::error::AuthError;
use super::jwks::JwksManager;

/// Clock skew tolerance (60 seconds).
pub(crate) const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Verifies federated access tokens.
pub struct FederatedTokenValidator {
    jwks: Arc<JwksManager>,
    audience: String,
    allowed_issuers: Vec<String>,
}

impl FederatedTokenValidator {
    pub fn new(
        jwks: Arc<JwksManager>,
        audience: impl Into<String>,
        allowed_issuers: Vec<String>,
    ) -> Self {
        Self {
            jwks,
            audience: audience.into(),
            allowed_issuers,
        }
    }

    /// The key-set cache backing this validator.
    pub fn jwks(&self) -> &Arc<JwksManager> {
        &self.jwks
    }

    /// Verify a federated token and return its claims.
    pub async fn validate(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        let kid = header.kid.as_deref().ok_or(AuthError::UnknownKey)?;

        let (decoding_key, algorithm) = self.jwks.get_decoding_key(kid).await?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_audience(&[&self.audience]);

        let token_data =
            decode::<FederatedClaims>(token, &decoding_key, &validation).map_err(map_jwt_error)?;
        let claims = token_data.claims;

        if !self.allowed_issuers.is_empty() {
            let issuer = claims.iss.as_deref().unwrap_or_default();
            if !self.allowed_issuers.iter().any(|allowed| allowed == issuer) {
                tracing::warn!(issuer, "Federated token issuer not in allow-list");
                return Err(AuthError::IssuerNotAllowed);
            }
        }

        Ok(VerifiedClaims::from_claims(claims))
    }
}

/// Map jsonwebtoken failures to auth errors.
pub(crate) fn map_jwt_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
        ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => AuthError::AudienceMismatch,
        ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
        _ => AuthError::MalformedToken,
    }
}

/// Result of the unverified structural check.
///
/// Nothing in here is trustworthy: it exists for diagnostics only.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UnverifiedToken {
    /// Signing algorithm named in the header
    pub algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[schema(value_type = Option<Object>)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<serde_json::Value>,
    pub expires_at: i64,
}

impl UnverifiedToken {
    /// HMAC-signed tokens can only come from the local issuer.
    pub fn looks_local(&self) -> bool {
        self.algorithm.starts_with("HS")
    }
}

/// Structural sanity check without signature verification.
///
/// Requires three dot-separated segments and an `exp` claim. Never use the
/// result to authorize anything.
pub fn validate_minimal(token: &str) -> Result<UnverifiedToken, AuthError> {
    if token.split('.').count() != 3 {
        return Err(AuthError::MalformedToken);
    }

    let header: Header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
    let data = jsonwebtoken::dangerous::insecure_decode::<serde_json::Value>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = data.claims;

    let expires_at = claims
        .get("exp")
        .and_then(serde_json::Value::as_i64)
        .ok_or(AuthError::MalformedToken)?;

    Ok(UnverifiedToken {
        algorithm: format!("{:?}", header.alg),
        key_id: header.kid,
        issuer: claims
            .get("iss")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        audience: claims.get("aud").cloned(),
        expires_at,
    })
}
