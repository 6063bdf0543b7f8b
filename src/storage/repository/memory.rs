// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory account repository.
//!
//! Used for tests and for ephemeral runs without `DATA_DIR`. Same uniqueness
//! and revision semantics as the file-backed repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{check_unique, email_match_order, Account, AccountRepository};
use crate::storage::{StorageError, StorageResult};

#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<Account>> {
        Ok(self.accounts.read().await.get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StorageResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        let mut matches: Vec<&Account> = accounts
            .values()
            .filter(|a| a.email_matches(Some(email)))
            .collect();
        matches.sort_by(|a, b| email_match_order(a, b));
        Ok(matches.first().map(|a| (*a).clone()))
    }

    async fn find_by_federated_id(&self, federated_id: &str) -> StorageResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.federated_id.as_deref() == Some(federated_id))
            .cloned())
    }

    async fn create(&self, account: &Account) -> StorageResult<Account> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.id) {
            return Err(StorageError::Conflict(format!("account {} already exists", account.id)));
        }
        check_unique(account, accounts.values())?;
        accounts.insert(account.id.clone(), account.clone());
        Ok(account.clone())
    }

    async fn update(&self, account: &Account) -> StorageResult<Account> {
        let mut accounts = self.accounts.write().await;
        let current = accounts
            .get(&account.id)
            .ok_or_else(|| StorageError::NotFound(format!("Account {}", account.id)))?;
        if current.revision != account.revision {
            return Err(StorageError::Conflict(format!(
                "account {} was modified concurrently",
                account.id
            )));
        }
        check_unique(account, accounts.values())?;

        let mut committed = account.clone();
        committed.revision += 1;
        committed.updated_at = Utc::now();
        accounts.insert(committed.id.clone(), committed.clone());
        Ok(committed)
    }
}
