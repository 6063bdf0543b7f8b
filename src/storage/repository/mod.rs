// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account repository abstraction.
//!
//! The reconciler only talks to [`AccountRepository`]. Implementations must
//! enforce the account uniqueness rules and report violations (including a
//! stale `revision` on update) as [`StorageError::Conflict`]. Conflict
//! recovery is a repository operation: [`AccountRepository::create_or_reread`]
//! and [`AccountRepository::update_or_reread`] re-read exactly once and never
//! loop.

use async_trait::async_trait;

use super::{StorageError, StorageResult};

pub mod accounts;
pub mod memory;

pub use accounts::{Account, AuthMethod, FileAccountRepository};
pub use memory::InMemoryAccountRepository;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<Account>>;

    async fn find_by_username(&self, username: &str) -> StorageResult<Option<Account>>;

    /// Case-insensitive email lookup.
    ///
    /// When several accounts share the address, an account that is already
    /// linked to a federated identity is returned before unlinked ones.
    async fn find_by_email(&self, email: &str) -> StorageResult<Option<Account>>;

    async fn find_by_federated_id(&self, federated_id: &str) -> StorageResult<Option<Account>>;

    /// Insert a new account. Returns the committed record.
    async fn create(&self, account: &Account) -> StorageResult<Account>;

    /// Replace an existing account if its `revision` is still current.
    /// Returns the committed record with the revision bumped.
    async fn update(&self, account: &Account) -> StorageResult<Account>;

    /// Backend liveness check.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Create, or on conflict return the record a concurrent writer committed
    /// first: looked up by username, then by email.
    async fn create_or_reread(&self, account: &Account) -> StorageResult<Account> {
        let reason = match self.create(account).await {
            Ok(created) => return Ok(created),
            Err(StorageError::Conflict(reason)) => reason,
            Err(e) => return Err(e),
        };

        tracing::info!(
            username = %account.username,
            %reason,
            "Account create conflicted, re-reading committed record"
        );

        if let Some(existing) = self.find_by_username(&account.username).await? {
            return Ok(existing);
        }
        if let Some(email) = account.email.as_deref() {
            if let Some(existing) = self.find_by_email(email).await? {
                return Ok(existing);
            }
        }

        Err(StorageError::Conflict(reason))
    }

    /// Update, or on conflict discard the local change and return the record
    /// as currently committed.
    async fn update_or_reread(&self, account: &Account) -> StorageResult<Account> {
        let reason = match self.update(account).await {
            Ok(updated) => return Ok(updated),
            Err(StorageError::Conflict(reason)) => reason,
            Err(e) => return Err(e),
        };

        tracing::info!(
            account_id = %account.id,
            %reason,
            "Account update conflicted, re-reading committed record"
        );

        self.find_by_id(&account.id)
            .await?
            .ok_or(StorageError::Conflict(reason))
    }
}

/// Check `candidate` against every other stored account.
///
/// Rules: usernames are unique; non-null federated ids are unique; an email
/// may be shared by unlinked accounts but never by two linked ones.
pub(crate) fn check_unique<'a>(
    candidate: &Account,
    existing: impl IntoIterator<Item = &'a Account>,
) -> StorageResult<()> {
    for other in existing {
        if other.id == candidate.id {
            continue;
        }
        if other.username == candidate.username {
            return Err(StorageError::Conflict(format!(
                "username {} already exists",
                candidate.username
            )));
        }
        if let (Some(mine), Some(theirs)) = (&candidate.federated_id, &other.federated_id) {
            if mine == theirs {
                return Err(StorageError::Conflict(
                    "federated identity already linked".to_string(),
                ));
            }
            if candidate.email_matches(other.email.as_deref()) {
                return Err(StorageError::Conflict(
                    "email already linked to another identity".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Sort key used by `find_by_email` implementations: linked accounts first,
/// then oldest first.
pub(crate) fn email_match_order(a: &Account, b: &Account) -> std::cmp::Ordering {
    b.federated_id
        .is_some()
        .cmp(&a.federated_id.is_some())
        .then(a.created_at.cmp(&b.created_at))
        .then(a.id.cmp(&b.id))
}
