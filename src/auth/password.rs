// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password hashing capability.

use super::error::AuthError;

/// Default bcrypt work factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Well-formed bcrypt digest of no known password. Verified against when the
/// username is unknown so login timing does not reveal which accounts exist.
pub const DUMMY_DIGEST: &str = "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// Malformed digests verify as `false`.
    fn verify(&self, password: &str, digest: &str) -> bool;

    /// Digest of a random value nobody knows, for accounts that must never
    /// log in with a password.
    fn unusable_digest(&self) -> Result<String, AuthError> {
        self.hash(&uuid::Uuid::new_v4().to_string())
    }
}

/// bcrypt-backed [`PasswordHasher`].
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AuthError::InternalError(format!("Password hashing failed: {e}")))
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        match bcrypt::verify(password, digest) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(error = %e, "Password verification failed on stored digest");
                false
            }
        }
    }
}
