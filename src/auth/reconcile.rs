// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mapping verified federated claims onto local accounts.
//!
//! Resolution order, first match wins:
//!
//! 1. account already linked to the federated id
//! 2. unlinked account with the token's email: link it
//! 3. account with that email linked to another identity: conflict
//! 4. unlinked account whose username is the linking username: link it
//! 5. that username linked to another identity: conflict
//! 6. nothing matched: create a federated account
//!
//! The federated id is authoritative over email, and email over username.
//! Every write goes through the repository's write-or-re-read operations, so
//! a concurrent request that committed the same change first is absorbed
//! instead of surfacing as an error.

use std::sync::Arc;

use chrono::Utc;

use super::claims::{fingerprint, VerifiedClaims};
use super::error::AuthError;
use super::overrides::{IdentityOverride, OverridePolicy};
use super::password::PasswordHasher;
use super::roles::Role;
use crate::storage::{Account, AccountRepository, AuthMethod, StorageError};

/// Unit assigned when no override names one.
pub const DEFAULT_UNIT_ID: &str = "u3";

pub struct IdentityReconciler {
    accounts: Arc<dyn AccountRepository>,
    overrides: Arc<OverridePolicy>,
    hasher: Arc<dyn PasswordHasher>,
    default_unit_id: String,
}

impl IdentityReconciler {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        overrides: Arc<OverridePolicy>,
        hasher: Arc<dyn PasswordHasher>,
        default_unit_id: impl Into<String>,
    ) -> Self {
        Self {
            accounts,
            overrides,
            hasher,
            default_unit_id: default_unit_id.into(),
        }
    }

    /// Resolve verified claims to an enabled account, linking or creating
    /// one when needed.
    pub async fn resolve(&self, claims: &VerifiedClaims) -> Result<Account, AuthError> {
        let federated_id = claims
            .federated_id()
            .ok_or(AuthError::MissingIdentityClaim)?;
        let linking_username = claims
            .linking_username()
            .ok_or(AuthError::MissingIdentityClaim)?;
        let fp = fingerprint(federated_id);
        let policy = self.overrides.get(&linking_username);

        if let Some(account) = self
            .accounts
            .find_by_federated_id(federated_id)
            .await
            .map_err(persistence_failure)?
        {
            return self.existing_link(account, &fp).await;
        }

        if let Some(email) = claims.email.as_deref() {
            if let Some(account) = self
                .accounts
                .find_by_email(email)
                .await
                .map_err(persistence_failure)?
            {
                if account.is_linked() {
                    tracing::warn!(
                        subject = %fp,
                        account_id = %account.id,
                        "Email already linked to another federated identity"
                    );
                    return Err(AuthError::IdentityConflict(
                        "Email already linked to another identity".into(),
                    ));
                }
                return self.link(account, claims, federated_id, policy, &fp).await;
            }
        }

        if let Some(account) = self
            .accounts
            .find_by_username(&linking_username)
            .await
            .map_err(persistence_failure)?
        {
            if account.is_linked() {
                tracing::warn!(
                    subject = %fp,
                    username = %account.username,
                    "Username already linked to another federated identity"
                );
                return Err(AuthError::IdentityConflict(
                    "Username already linked to another identity".into(),
                ));
            }
            return self.link(account, claims, federated_id, policy, &fp).await;
        }

        self.create(claims, federated_id, linking_username, policy, &fp)
            .await
    }

    async fn existing_link(&self, account: Account, fp: &str) -> Result<Account, AuthError> {
        ensure_enabled(&account, fp)?;
        if account.unit_id.is_some() {
            return Ok(account);
        }

        let mut backfilled = account;
        backfilled.unit_id = Some(self.default_unit_id.clone());
        let committed = self
            .accounts
            .update_or_reread(&backfilled)
            .await
            .map_err(persistence_failure)?;

        tracing::info!(
            subject = %fp,
            username = %committed.username,
            unit_id = ?committed.unit_id,
            "Backfilled unit on federated account"
        );
        ensure_enabled(&committed, fp)?;
        Ok(committed)
    }

    async fn link(
        &self,
        mut account: Account,
        claims: &VerifiedClaims,
        federated_id: &str,
        policy: Option<&IdentityOverride>,
        fp: &str,
    ) -> Result<Account, AuthError> {
        ensure_enabled(&account, fp)?;

        if let (Some(recorded), Some(presented)) = (
            account.federated_tenant_id.as_deref(),
            claims.tenant_id.as_deref(),
        ) {
            if recorded != presented {
                tracing::warn!(
                    subject = %fp,
                    username = %account.username,
                    "Refusing to link account across tenants"
                );
                return Err(AuthError::TenantMismatch);
            }
        }

        account.federated_id = Some(federated_id.to_string());
        account.auth_method = AuthMethod::Federated;
        account.federated_tenant_id = claims.tenant_id.clone();
        if let Some(policy) = policy {
            apply_override(&mut account, policy);
        }

        let committed = self
            .accounts
            .update_or_reread(&account)
            .await
            .map_err(persistence_failure)?;
        ensure_owned(&committed, federated_id, fp)?;
        ensure_enabled(&committed, fp)?;

        tracing::info!(
            subject = %fp,
            username = %committed.username,
            account_id = %committed.id,
            "Linked existing account to federated identity"
        );
        Ok(committed)
    }

    async fn create(
        &self,
        claims: &VerifiedClaims,
        federated_id: &str,
        username: String,
        policy: Option<&IdentityOverride>,
        fp: &str,
    ) -> Result<Account, AuthError> {
        let display_name = policy
            .and_then(|p| p.display_name.clone())
            .or_else(|| claims.display_name.clone())
            .unwrap_or_else(|| username.clone());
        let now = Utc::now();
        let digest = self.unusable_digest().await?;

        let candidate = Account {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            email: claims.email.clone(),
            display_name,
            credential_digest: Some(digest),
            role: policy.and_then(|p| p.role).unwrap_or(Role::Staff),
            unit_id: Some(
                policy
                    .and_then(|p| p.unit_id.clone())
                    .unwrap_or_else(|| self.default_unit_id.clone()),
            ),
            federated_id: Some(federated_id.to_string()),
            federated_tenant_id: claims.tenant_id.clone(),
            auth_method: AuthMethod::Federated,
            is_disabled: false,
            revision: 0,
            created_at: now,
            updated_at: now,
        };

        let committed = self
            .accounts
            .create_or_reread(&candidate)
            .await
            .map_err(persistence_failure)?;
        ensure_owned(&committed, federated_id, fp)?;
        ensure_enabled(&committed, fp)?;

        if committed.id == candidate.id {
            tracing::info!(
                subject = %fp,
                username = %committed.username,
                role = %committed.role,
                "Provisioned federated account"
            );
        }
        Ok(committed)
    }

    /// Hashes on the blocking pool.
    async fn unusable_digest(&self) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.unusable_digest())
            .await
            .map_err(|e| AuthError::InternalError(format!("Password hashing task failed: {e}")))?
    }
}

/// Copy the fields an override sets; leave the rest untouched.
fn apply_override(account: &mut Account, policy: &IdentityOverride) {
    if let Some(role) = policy.role {
        account.role = role;
    }
    if let Some(unit_id) = &policy.unit_id {
        account.unit_id = Some(unit_id.clone());
    }
    if let Some(name) = policy.display_name.as_deref().filter(|n| !n.is_empty()) {
        account.display_name = name.to_string();
    }
}

fn ensure_enabled(account: &Account, fp: &str) -> Result<(), AuthError> {
    if account.is_disabled {
        tracing::warn!(subject = %fp, username = %account.username, "Disabled account rejected");
        return Err(AuthError::AccountDisabled);
    }
    Ok(())
}

/// A re-read may return a record some other identity claimed first.
fn ensure_owned(account: &Account, federated_id: &str, fp: &str) -> Result<(), AuthError> {
    if account.federated_id.as_deref() == Some(federated_id) {
        return Ok(());
    }
    tracing::warn!(
        subject = %fp,
        username = %account.username,
        "Concurrent write left the account owned by another identity"
    );
    Err(AuthError::IdentityConflict(
        "Account already linked to another identity".into(),
    ))
}

fn persistence_failure(e: StorageError) -> AuthError {
    tracing::error!(error = %e, "Account persistence failed during federated sign-in");
    AuthError::from(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::FederatedClaims;
    use crate::auth::password::BcryptHasher;
    use crate::storage::{InMemoryAccountRepository, StorageResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    fn claims(oid: &str, email: Option<&str>, tenant: Option<&str>) -> VerifiedClaims {
        VerifiedClaims::from_claims(FederatedClaims {
            oid: Some(oid.into()),
            tid: tenant.map(str::to_string),
            preferred_username: email.map(str::to_string),
            name: Some("Token Name".into()),
            exp: 1_700_000_000,
            ..Default::default()
        })
    }

    fn reconciler_with(
        repo: Arc<dyn AccountRepository>,
        overrides: OverridePolicy,
    ) -> IdentityReconciler {
        IdentityReconciler::new(
            repo,
            Arc::new(overrides),
            Arc::new(BcryptHasher::new(4)),
            DEFAULT_UNIT_ID,
        )
    }

    fn setup() -> (Arc<InMemoryAccountRepository>, IdentityReconciler) {
        let repo = Arc::new(InMemoryAccountRepository::new());
        let reconciler = reconciler_with(repo.clone(), OverridePolicy::new());
        (repo, reconciler)
    }

    fn local(username: &str, email: Option<&str>) -> Account {
        let mut account = Account::new_local(username, username, Some("digest".into()), Role::User);
        account.email = email.map(str::to_string);
        account
    }

    fn linked(username: &str, email: &str, federated_id: &str) -> Account {
        let mut account = local(username, Some(email));
        account.federated_id = Some(federated_id.into());
        account.auth_method = AuthMethod::Federated;
        account.unit_id = Some("u1".into());
        account
    }

    #[tokio::test]
    async fn new_identity_creates_staff_account_in_default_unit() {
        let (repo, reconciler) = setup();
        let account = reconciler
            .resolve(&claims("xyz", Some("new@org.se"), Some("t1")))
            .await
            .unwrap();

        assert_eq!(account.username, "new@org.se");
        assert_eq!(account.email.as_deref(), Some("new@org.se"));
        assert_eq!(account.display_name, "Token Name");
        assert_eq!(account.role, Role::Staff);
        assert_eq!(account.auth_method, AuthMethod::Federated);
        assert_eq!(account.unit_id.as_deref(), Some(DEFAULT_UNIT_ID));
        assert_eq!(account.federated_id.as_deref(), Some("xyz"));
        assert_eq!(account.federated_tenant_id.as_deref(), Some("t1"));
        assert!(account.credential_digest.is_some());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn created_account_takes_override_values() {
        let repo = Arc::new(InMemoryAccountRepository::new());
        let overrides = OverridePolicy::new().with_entry(
            "boss@org.se",
            IdentityOverride {
                role: Some(Role::Admin),
                unit_id: Some("u1".into()),
                display_name: Some("The Boss".into()),
            },
        );
        let reconciler = reconciler_with(repo.clone(), overrides);

        let account = reconciler
            .resolve(&claims("boss-oid", Some("Boss@Org.se"), None))
            .await
            .unwrap();
        assert_eq!(account.username, "boss@org.se");
        assert_eq!(account.role, Role::Admin);
        assert_eq!(account.unit_id.as_deref(), Some("u1"));
        assert_eq!(account.display_name, "The Boss");
    }

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let (repo, reconciler) = setup();
        let token = claims("same-oid", Some("same@org.se"), None);

        let first = reconciler.resolve(&token).await.unwrap();
        let second = reconciler.resolve(&token).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn unlinked_email_match_is_linked_with_override() {
        let repo = Arc::new(InMemoryAccountRepository::new());
        let mut existing = local("anna", Some("anna@org.se"));
        existing.unit_id = Some("u7".into());
        repo.create(&existing).await.unwrap();

        let overrides = OverridePolicy::new().with_entry(
            "anna@org.se",
            IdentityOverride {
                role: Some(Role::UnitAdmin),
                ..Default::default()
            },
        );
        let reconciler = reconciler_with(repo.clone(), overrides);

        let account = reconciler
            .resolve(&claims("abc", Some("anna@org.se"), Some("t1")))
            .await
            .unwrap();
        assert_eq!(account.id, existing.id);
        assert_eq!(account.federated_id.as_deref(), Some("abc"));
        assert_eq!(account.auth_method, AuthMethod::Federated);
        assert_eq!(account.federated_tenant_id.as_deref(), Some("t1"));
        assert_eq!(account.role, Role::UnitAdmin);
        // Fields the override leaves out are kept.
        assert_eq!(account.unit_id.as_deref(), Some("u7"));
        assert_eq!(account.display_name, "anna");
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn email_linked_elsewhere_is_a_conflict_without_mutation() {
        let (repo, reconciler) = setup();
        let other = repo
            .create(&linked("anna", "anna@org.se", "oid-a"))
            .await
            .unwrap();

        let result = reconciler
            .resolve(&claims("oid-b", Some("anna@org.se"), None))
            .await;
        assert!(matches!(result, Err(AuthError::IdentityConflict(_))));

        let after = repo.find_by_id(&other.id).await.unwrap().unwrap();
        assert_eq!(after, other);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn federated_id_match_wins_over_email_match() {
        let (repo, reconciler) = setup();
        let by_oid = repo
            .create(&linked("first", "first@org.se", "oid-1"))
            .await
            .unwrap();
        let by_email = repo
            .create(&local("second", Some("second@org.se")))
            .await
            .unwrap();

        let account = reconciler
            .resolve(&claims("oid-1", Some("second@org.se"), None))
            .await
            .unwrap();
        assert_eq!(account.id, by_oid.id);

        let untouched = repo.find_by_id(&by_email.id).await.unwrap().unwrap();
        assert!(untouched.federated_id.is_none());
    }

    #[tokio::test]
    async fn disabled_accounts_are_forbidden_on_every_branch() {
        let (repo, reconciler) = setup();

        let mut by_oid = linked("a", "a@org.se", "oid-a");
        by_oid.is_disabled = true;
        repo.create(&by_oid).await.unwrap();
        let mut by_email = local("b", Some("b@org.se"));
        by_email.is_disabled = true;
        repo.create(&by_email).await.unwrap();
        let mut by_username = local("c@org.se", None);
        by_username.is_disabled = true;
        repo.create(&by_username).await.unwrap();

        for token in [
            claims("oid-a", Some("a@org.se"), None),
            claims("oid-b", Some("b@org.se"), None),
            claims("oid-c", Some("c@org.se"), None),
        ] {
            let result = reconciler.resolve(&token).await;
            assert!(matches!(result, Err(AuthError::AccountDisabled)));
        }
        assert!(repo.find_by_federated_id("oid-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recorded_tenant_must_match() {
        let (repo, reconciler) = setup();
        let mut existing = local("anna", Some("anna@org.se"));
        existing.federated_tenant_id = Some("tenant-a".into());
        repo.create(&existing).await.unwrap();

        let result = reconciler
            .resolve(&claims("oid-x", Some("anna@org.se"), Some("tenant-b")))
            .await;
        assert!(matches!(result, Err(AuthError::TenantMismatch)));
        assert!(repo.find_by_federated_id("oid-x").await.unwrap().is_none());

        let linked = reconciler
            .resolve(&claims("oid-x", Some("anna@org.se"), Some("tenant-a")))
            .await
            .unwrap();
        assert_eq!(linked.id, existing.id);
    }

    #[tokio::test]
    async fn username_match_is_linked_when_no_email_matches() {
        let (repo, reconciler) = setup();
        let existing = repo.create(&local("abc-123", None)).await.unwrap();

        let account = reconciler
            .resolve(&claims("ABC-123", None, None))
            .await
            .unwrap();
        assert_eq!(account.id, existing.id);
        assert_eq!(account.federated_id.as_deref(), Some("ABC-123"));
    }

    #[tokio::test]
    async fn username_linked_elsewhere_is_a_conflict() {
        let (repo, reconciler) = setup();
        let mut existing = linked("carl@org.se", "carl.other@org.se", "oid-other");
        existing.email = None;
        repo.create(&existing).await.unwrap();

        let result = reconciler
            .resolve(&claims("oid-new", Some("carl@org.se"), None))
            .await;
        assert!(matches!(result, Err(AuthError::IdentityConflict(_))));
    }

    #[tokio::test]
    async fn missing_unit_is_backfilled() {
        let (repo, reconciler) = setup();
        let mut existing = linked("dora", "dora@org.se", "oid-d");
        existing.unit_id = None;
        repo.create(&existing).await.unwrap();

        let account = reconciler
            .resolve(&claims("oid-d", Some("dora@org.se"), None))
            .await
            .unwrap();
        assert_eq!(account.unit_id.as_deref(), Some(DEFAULT_UNIT_ID));
        assert_eq!(account.revision, 1);
    }

    #[tokio::test]
    async fn missing_identity_claim_is_rejected() {
        let (repo, reconciler) = setup();
        let token = VerifiedClaims::from_claims(FederatedClaims {
            preferred_username: Some("ghost@org.se".into()),
            exp: 1_700_000_000,
            ..Default::default()
        });

        let result = reconciler.resolve(&token).await;
        assert!(matches!(result, Err(AuthError::MissingIdentityClaim)));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_first_sign_ins_create_one_account() {
        let (repo, reconciler) = setup();
        let reconciler = Arc::new(reconciler);
        let token = claims("racy-oid", Some("racy@org.se"), None);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reconciler = reconciler.clone();
                let token = token.clone();
                tokio::spawn(async move { reconciler.resolve(&token).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(repo.len().await, 1);
    }

    /// Commits a competing account right before the first create call.
    #[derive(PartialEq)]
    enum RaceOn {
        Create,
        Update,
    }

    /// Commits `competitor` just before the reconciler's first write of the
    /// given kind, as a concurrent request would.
    struct RacingRepository {
        inner: InMemoryAccountRepository,
        competitor: Account,
        race_on: RaceOn,
        raced: AtomicBool,
    }

    impl RacingRepository {
        fn new(inner: InMemoryAccountRepository, competitor: Account, race_on: RaceOn) -> Self {
            Self {
                inner,
                competitor,
                race_on,
                raced: AtomicBool::new(false),
            }
        }

        fn should_race(&self, kind: RaceOn) -> bool {
            self.race_on == kind && !self.raced.swap(true, Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AccountRepository for RacingRepository {
        async fn find_by_id(&self, id: &str) -> StorageResult<Option<Account>> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_username(&self, username: &str) -> StorageResult<Option<Account>> {
            self.inner.find_by_username(username).await
        }

        async fn find_by_email(&self, email: &str) -> StorageResult<Option<Account>> {
            self.inner.find_by_email(email).await
        }

        async fn find_by_federated_id(&self, id: &str) -> StorageResult<Option<Account>> {
            self.inner.find_by_federated_id(id).await
        }

        async fn create(&self, account: &Account) -> StorageResult<Account> {
            if self.should_race(RaceOn::Create) {
                self.inner.create(&self.competitor).await?;
            }
            self.inner.create(account).await
        }

        async fn update(&self, account: &Account) -> StorageResult<Account> {
            if self.should_race(RaceOn::Update) {
                self.inner.update(&self.competitor).await?;
            }
            self.inner.update(account).await
        }
    }

    #[tokio::test]
    async fn create_conflict_returns_the_committed_record() {
        let competitor = linked("race@org.se", "race@org.se", "race-oid");
        let repo = Arc::new(RacingRepository::new(
            InMemoryAccountRepository::new(),
            competitor.clone(),
            RaceOn::Create,
        ));
        let reconciler = reconciler_with(repo.clone(), OverridePolicy::new());

        let account = reconciler
            .resolve(&claims("race-oid", Some("race@org.se"), None))
            .await
            .unwrap();
        assert_eq!(account.id, competitor.id);
        assert_eq!(repo.inner.len().await, 1);
    }

    #[tokio::test]
    async fn create_conflict_with_foreign_identity_is_a_conflict() {
        let competitor = linked("race@org.se", "race@org.se", "someone-else");
        let repo = Arc::new(RacingRepository::new(
            InMemoryAccountRepository::new(),
            competitor,
            RaceOn::Create,
        ));
        let reconciler = reconciler_with(repo.clone(), OverridePolicy::new());

        let result = reconciler
            .resolve(&claims("race-oid", Some("race@org.se"), None))
            .await;
        assert!(matches!(result, Err(AuthError::IdentityConflict(_))));
        assert!(repo
            .inner
            .find_by_federated_id("race-oid")
            .await
            .unwrap()
            .is_none());
    }

    /// Seed an unlinked account and a competitor that links it first.
    async fn link_race(competitor_oid: &str) -> (Arc<RacingRepository>, Account) {
        let inner = InMemoryAccountRepository::new();
        let stored = inner
            .create(&local("shared", Some("shared@org.se")))
            .await
            .unwrap();
        let mut competitor = stored.clone();
        competitor.federated_id = Some(competitor_oid.into());
        competitor.auth_method = AuthMethod::Federated;
        let repo = Arc::new(RacingRepository::new(inner, competitor, RaceOn::Update));
        (repo, stored)
    }

    #[tokio::test]
    async fn concurrent_link_by_same_identity_returns_committed_record() {
        let (repo, stored) = link_race("link-oid").await;
        let reconciler = reconciler_with(repo.clone(), OverridePolicy::new());

        let account = reconciler
            .resolve(&claims("link-oid", Some("shared@org.se"), None))
            .await
            .unwrap();
        assert_eq!(account.id, stored.id);
        assert_eq!(account.federated_id.as_deref(), Some("link-oid"));
        // Only the competitor's write landed.
        assert_eq!(account.revision, stored.revision + 1);
        assert_eq!(repo.inner.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_link_by_other_identity_is_a_conflict() {
        let (repo, stored) = link_race("other-oid").await;
        let reconciler = reconciler_with(repo.clone(), OverridePolicy::new());

        let result = reconciler
            .resolve(&claims("link-oid", Some("shared@org.se"), None))
            .await;
        assert!(matches!(result, Err(AuthError::IdentityConflict(_))));

        let committed = repo.inner.find_by_id(&stored.id).await.unwrap().unwrap();
        assert_eq!(committed.federated_id.as_deref(), Some("other-oid"));
    }

    struct SlowHasher;

    impl PasswordHasher for SlowHasher {
        fn hash(&self, _password: &str) -> Result<String, AuthError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok("$2b$04$unusable".into())
        }

        fn verify(&self, _password: &str, _digest: &str) -> bool {
            false
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn provisioning_does_not_stall_the_runtime() {
        let reconciler = IdentityReconciler::new(
            Arc::new(InMemoryAccountRepository::new()),
            Arc::new(OverridePolicy::new()),
            Arc::new(SlowHasher),
            DEFAULT_UNIT_ID,
        );

        let ticker = tokio::spawn(async {
            let mut worst = Duration::ZERO;
            let mut last = Instant::now();
            for _ in 0..20 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                let now = Instant::now();
                worst = worst.max(now - last);
                last = now;
            }
            worst
        });
        // Let the ticker start before provisioning begins.
        tokio::task::yield_now().await;

        reconciler
            .resolve(&claims("slow-oid", Some("slow@org.se"), None))
            .await
            .unwrap();
        let worst = ticker.await.unwrap();
        assert!(worst < Duration::from_millis(100), "runtime stalled for {worst:?}");
    }
}
