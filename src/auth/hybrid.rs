// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hybrid bearer authentication.
//!
//! A bearer token is first tried as a local HMAC token. That path needs no
//! network access, so it is the fast path for password users. Any failure
//! there (bad signature, unknown or disabled account) falls through to the
//! federated path: validator, scope check, then identity reconciliation.
//!
//! Errors from the federated path that carry a decision about the caller
//! ([`AuthError::is_explicit`]) are returned as-is. Everything else ends in a
//! single `Unauthenticated` verdict naming both mechanisms.

use std::sync::Arc;

use super::error::AuthError;
use super::federated::FederatedTokenValidator;
use super::local::LocalTokenValidator;
use super::reconcile::IdentityReconciler;
use super::scopes::ScopeAuthorizer;
use crate::storage::{Account, AccountRepository};

const BOTH_FAILED: &str = "Could not validate credentials (tried both local JWT and OIDC)";

/// The federated half: validate, authorize scopes, reconcile.
pub struct FederatedAuthenticator {
    validator: FederatedTokenValidator,
    scopes: ScopeAuthorizer,
    reconciler: IdentityReconciler,
}

impl FederatedAuthenticator {
    pub fn new(
        validator: FederatedTokenValidator,
        scopes: ScopeAuthorizer,
        reconciler: IdentityReconciler,
    ) -> Self {
        Self {
            validator,
            scopes,
            reconciler,
        }
    }

    pub fn validator(&self) -> &FederatedTokenValidator {
        &self.validator
    }

    /// Scope failures return before the reconciler can touch any account.
    pub async fn authenticate(&self, token: &str) -> Result<Account, AuthError> {
        let claims = self.validator.validate(token).await?;
        self.scopes.authorize(&claims)?;
        self.reconciler.resolve(&claims).await
    }
}

pub struct HybridAuthenticator {
    local: LocalTokenValidator,
    federated: Option<FederatedAuthenticator>,
    accounts: Arc<dyn AccountRepository>,
}

impl HybridAuthenticator {
    pub fn new(
        local: LocalTokenValidator,
        federated: Option<FederatedAuthenticator>,
        accounts: Arc<dyn AccountRepository>,
    ) -> Self {
        Self {
            local,
            federated,
            accounts,
        }
    }

    /// `None` when federated sign-in is not configured.
    pub fn federated(&self) -> Option<&FederatedAuthenticator> {
        self.federated.as_ref()
    }

    /// Resolve a bearer token to an enabled account.
    pub async fn authenticate(&self, token: &str) -> Result<Account, AuthError> {
        match self.authenticate_local(token).await {
            Ok(account) => {
                tracing::debug!(username = %account.username, "Authenticated with local token");
                return Ok(account);
            }
            Err(reason) => {
                tracing::debug!(reason = %reason, "Local token rejected, trying federated");
            }
        }

        let Some(federated) = &self.federated else {
            return Err(AuthError::Unauthenticated(BOTH_FAILED.into()));
        };

        match federated.authenticate(token).await {
            Ok(account) => Ok(account),
            Err(e) if e.is_explicit() => Err(e),
            Err(e) => {
                tracing::debug!(reason = %e, "Federated token rejected");
                Err(AuthError::Unauthenticated(BOTH_FAILED.into()))
            }
        }
    }

    async fn authenticate_local(&self, token: &str) -> Result<Account, AuthError> {
        let username = self.local.validate(token)?;

        let account = self
            .accounts
            .find_by_username(&username)
            .await?
            .ok_or_else(|| AuthError::Unauthenticated(format!("No account for {username}")))?;

        if account.is_disabled {
            return Err(AuthError::AccountDisabled);
        }
        Ok(account)
    }
}
