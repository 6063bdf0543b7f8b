// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Account Storage
//!
//! Durable storage for local accounts.
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   accounts/
//!     {account_id}.json
//! ```
//!
//! Without `DATA_DIR` the server runs on [`InMemoryAccountRepository`] and
//! loses every account on restart.

pub mod json_fs;
pub mod paths;
pub mod repository;

pub use json_fs::{JsonFileStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use repository::{
    Account, AccountRepository, AuthMethod, FileAccountRepository, InMemoryAccountRepository,
};
