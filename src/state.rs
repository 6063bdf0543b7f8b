// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::hybrid::{FederatedAuthenticator, HybridAuthenticator};
use crate::auth::jwks::JwksManager;
use crate::auth::local::{LocalTokenIssuer, LocalTokenValidator};
use crate::auth::overrides::OverridePolicy;
use crate::auth::password::PasswordHasher;
use crate::auth::reconcile::IdentityReconciler;
use crate::auth::scopes::ScopeAuthorizer;
use crate::auth::{AuthError, FederatedTokenValidator, Role};
use crate::config::{SeedAdmin, Settings};
use crate::storage::{Account, AccountRepository};

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountRepository>,
    pub authenticator: Arc<HybridAuthenticator>,
    pub issuer: Arc<LocalTokenIssuer>,
    pub hasher: Arc<dyn PasswordHasher>,
}

impl AppState {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        authenticator: HybridAuthenticator,
        issuer: LocalTokenIssuer,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            accounts,
            authenticator: Arc::new(authenticator),
            issuer: Arc::new(issuer),
            hasher,
        }
    }

    /// Wire the authentication stack from settings.
    pub fn from_settings(
        settings: &Settings,
        accounts: Arc<dyn AccountRepository>,
        overrides: OverridePolicy,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self, AuthError> {
        let local = LocalTokenValidator::new(&settings.secret_key, settings.algorithm)?;
        let issuer = LocalTokenIssuer::new(
            &settings.secret_key,
            settings.algorithm,
            settings.access_token_expire_minutes,
        )?;

        let federated = match &settings.federated {
            Some(fed) => {
                let jwks = JwksManager::new(&fed.jwks_url)?.with_cache_ttl(fed.cache_ttl);
                let validator = FederatedTokenValidator::new(
                    Arc::new(jwks),
                    &fed.audience,
                    fed.allowed_issuers.clone(),
                );
                let reconciler = IdentityReconciler::new(
                    accounts.clone(),
                    Arc::new(overrides),
                    hasher.clone(),
                    &settings.default_unit_id,
                );
                tracing::info!(
                    jwks_url = %fed.jwks_url,
                    issuers = fed.allowed_issuers.len(),
                    scopes_enforced = !fed.required_scopes.is_empty(),
                    "Federated sign-in enabled"
                );
                Some(FederatedAuthenticator::new(
                    validator,
                    ScopeAuthorizer::new(fed.required_scopes.clone()),
                    reconciler,
                ))
            }
            None => {
                tracing::info!("Federated sign-in disabled, accepting local tokens only");
                None
            }
        };

        let authenticator = HybridAuthenticator::new(local, federated, accounts.clone());
        Ok(Self::new(accounts, authenticator, issuer, hasher))
    }

    /// Key-set cache of the federated path, when enabled.
    pub fn jwks(&self) -> Option<&Arc<JwksManager>> {
        self.authenticator
            .federated()
            .map(|federated| federated.validator().jwks())
    }
}

/// Create the seed admin unless the username is already taken.
///
/// Returns whether an account was created.
pub async fn seed_admin(
    accounts: &dyn AccountRepository,
    hasher: &dyn PasswordHasher,
    seed: &SeedAdmin,
) -> Result<bool, AuthError> {
    if accounts.find_by_username(&seed.username).await?.is_some() {
        tracing::debug!(username = %seed.username, "Seed admin already exists");
        return Ok(false);
    }

    let digest = hasher.hash(&seed.password)?;
    let admin = Account::new_local(&seed.username, &seed.username, Some(digest), Role::Admin);
    accounts.create_or_reread(&admin).await?;
    tracing::info!(username = %seed.username, "Seeded admin account");
    Ok(true)
}
