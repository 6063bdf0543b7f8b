// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Locally issued HMAC tokens.
//!
//! Local tokens carry `{sub, iat, exp}` where `sub` is the account username,
//! signed with the single shared secret. Only HMAC algorithms are accepted,
//! so a federated RS256 token can never verify here.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::federated::{map_jwt_error, CLOCK_SKEW_LEEWAY};

/// Default local token lifetime.
pub const DEFAULT_EXPIRE_MINUTES: i64 = 30;

/// Longest accepted local token lifetime (one year).
pub const MAX_EXPIRE_MINUTES: i64 = 60 * 24 * 365;

/// Claims of a local access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalClaims {
    /// Account username
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    iat: i64,
    exp: i64,
}

/// Whether the algorithm is one the local issuer may use.
pub fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

/// Validates local tokens and returns the subject username.
pub struct LocalTokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl LocalTokenValidator {
    pub fn new(secret: &str, algorithm: Algorithm) -> Result<Self, AuthError> {
        if !is_hmac(algorithm) {
            return Err(AuthError::InternalError(format!(
                "local tokens require an HMAC algorithm, got {algorithm:?}"
            )));
        }

        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Verify signature and expiry; return the non-empty `sub` claim.
    pub fn validate(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<LocalClaims>(token, &self.decoding_key, &self.validation)
            .map_err(map_jwt_error)?;

        data.claims
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| AuthError::Unauthenticated("Could not validate credentials".into()))
    }
}

/// Issues local tokens after password login.
pub struct LocalTokenIssuer {
    encoding_key: EncodingKey,
    algorithm: Algorithm,
    lifetime: Duration,
}

impl LocalTokenIssuer {
    pub fn new(secret: &str, algorithm: Algorithm, expire_minutes: i64) -> Result<Self, AuthError> {
        if !is_hmac(algorithm) {
            return Err(AuthError::InternalError(format!(
                "local tokens require an HMAC algorithm, got {algorithm:?}"
            )));
        }

        let lifetime = Duration::try_minutes(expire_minutes)
            .filter(|_| (1..=MAX_EXPIRE_MINUTES).contains(&expire_minutes))
            .ok_or_else(|| {
                AuthError::InternalError(format!(
                    "token lifetime must be 1..={MAX_EXPIRE_MINUTES} minutes, got {expire_minutes}"
                ))
            })?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            algorithm,
            lifetime,
        })
    }

    /// Sign a token for `username`.
    pub fn issue(&self, username: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = LocalClaims {
            sub: Some(username.to_string()),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(format!("Failed to sign token: {e}")))
    }

    /// Token lifetime in seconds.
    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime.num_seconds()
    }
}
