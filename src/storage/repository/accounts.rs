// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account entity and its file-backed repository.
//!
//! Each account is stored as a separate JSON file under `DATA_DIR/accounts/`.
//! Writes are serialized through a single mutex so the uniqueness scan and
//! the write happen as one step; reads scan the directory without locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use utoipa::ToSchema;

use super::{check_unique, email_match_order, AccountRepository};
use crate::auth::Role;
use crate::storage::{JsonFileStorage, StorageError, StorageResult};

/// How an account authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Username/password with locally issued tokens
    Local,
    /// Linked to a federated identity provider
    Federated,
}

/// Durable local account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Stable unique identifier (UUID)
    pub id: String,
    /// Unique login name
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub display_name: String,
    /// Password digest; unusable random digest for federated accounts
    #[serde(default)]
    pub credential_digest: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub unit_id: Option<String>,
    /// Provider object id; unique among non-null values
    #[serde(default)]
    pub federated_id: Option<String>,
    #[serde(default)]
    pub federated_tenant_id: Option<String>,
    pub auth_method: AuthMethod,
    #[serde(default)]
    pub is_disabled: bool,
    /// Optimistic concurrency counter, bumped on every committed update
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A fresh local account with a new id.
    pub fn new_local(
        username: impl Into<String>,
        display_name: impl Into<String>,
        credential_digest: Option<String>,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            email: None,
            display_name: display_name.into(),
            credential_digest,
            role,
            unit_id: None,
            federated_id: None,
            federated_tenant_id: None,
            auth_method: AuthMethod::Local,
            is_disabled: false,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this account is linked to a federated identity.
    pub fn is_linked(&self) -> bool {
        self.federated_id.is_some()
    }

    /// Case-insensitive comparison against this account's email.
    pub fn email_matches(&self, email: Option<&str>) -> bool {
        match (self.email.as_deref(), email) {
            (Some(mine), Some(theirs)) => mine.trim().eq_ignore_ascii_case(theirs.trim()),
            _ => false,
        }
    }
}

/// Repository for accounts on the local filesystem.
pub struct FileAccountRepository {
    storage: JsonFileStorage,
    write_lock: Mutex<()>,
}

impl FileAccountRepository {
    /// Create a new FileAccountRepository over initialized storage.
    pub fn new(storage: JsonFileStorage) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Every stored account. An unreadable file fails the whole load: a
    /// record missing from the list would slip past the uniqueness checks.
    fn load_all(&self) -> StorageResult<Vec<Account>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().accounts_dir(), "json")?;

        ids.iter()
            .map(|id| {
                self.storage
                    .read_json(self.storage.paths().account(id))
                    .inspect_err(|e| {
                        tracing::error!(account_id = %id, error = %e, "Unreadable account file");
                    })
            })
            .collect()
    }

    fn find(&self, predicate: impl Fn(&Account) -> bool) -> StorageResult<Option<Account>> {
        Ok(self.load_all()?.into_iter().find(|a| predicate(a)))
    }
}

#[async_trait]
impl AccountRepository for FileAccountRepository {
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<Account>> {
        let path = self.storage.paths().account(id);
        if !self.storage.exists(&path) {
            return Ok(None);
        }
        self.storage.read_json(path).map(Some)
    }

    async fn find_by_username(&self, username: &str) -> StorageResult<Option<Account>> {
        self.find(|a| a.username == username)
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<Account>> {
        let mut matches: Vec<Account> = self
            .load_all()?
            .into_iter()
            .filter(|a| a.email_matches(Some(email)))
            .collect();
        matches.sort_by(email_match_order);
        Ok(matches.into_iter().next())
    }

    async fn find_by_federated_id(&self, federated_id: &str) -> StorageResult<Option<Account>> {
        self.find(|a| a.federated_id.as_deref() == Some(federated_id))
    }

    async fn create(&self, account: &Account) -> StorageResult<Account> {
        let _guard = self.write_lock.lock().await;

        let path = self.storage.paths().account(&account.id);
        if self.storage.exists(&path) {
            return Err(StorageError::Conflict(format!("account {} already exists", account.id)));
        }
        check_unique(account, &self.load_all()?)?;

        self.storage.write_json(path, account)?;
        Ok(account.clone())
    }

    async fn update(&self, account: &Account) -> StorageResult<Account> {
        let _guard = self.write_lock.lock().await;

        let path = self.storage.paths().account(&account.id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Account {}", account.id)));
        }
        let current: Account = self.storage.read_json(&path)?;
        if current.revision != account.revision {
            return Err(StorageError::Conflict(format!(
                "account {} was modified concurrently",
                account.id
            )));
        }
        check_unique(account, &self.load_all()?)?;

        let mut committed = account.clone();
        committed.revision += 1;
        committed.updated_at = Utc::now();
        self.storage.write_json(path, &committed)?;
        Ok(committed)
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.storage.health_check()
    }
}
