// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-identity provisioning overrides.
//!
//! A static table keyed by lowercased email, loaded once at startup from a
//! JSON object:
//!
//! ```json
//! {
//!   "anna.berg@org.se": { "role": "unit_admin", "unit_id": "u1", "name": "Anna Berg" }
//! }
//! ```
//!
//! Every field is optional. Only fields that are present are applied to an
//! account.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::roles::Role;
use crate::config::ConfigError;

/// Provisioning values applied when an identity is linked or created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdentityOverride {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
}

/// Lookup table of overrides by normalized email.
#[derive(Debug, Clone, Default)]
pub struct OverridePolicy {
    entries: HashMap<String, IdentityOverride>,
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

impl OverridePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: HashMap<String, IdentityOverride> = serde_json::from_str(json)?;
        Ok(Self {
            entries: raw
                .into_iter()
                .map(|(key, entry)| (normalize(&key), entry))
                .collect(),
        })
    }

    /// Load the table from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::OverridesIo {
            path: path.display().to_string(),
            source,
        })?;
        let policy = Self::from_json_str(&json)?;
        tracing::info!(
            path = %path.display(),
            entries = policy.len(),
            "Loaded identity override table"
        );
        Ok(policy)
    }

    pub fn get(&self, linking_username: &str) -> Option<&IdentityOverride> {
        self.entries.get(&normalize(linking_username))
    }

    pub fn insert(&mut self, email: &str, entry: IdentityOverride) {
        self.entries.insert(normalize(email), entry);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_entry(mut self, email: &str, entry: IdentityOverride) -> Self {
        self.insert(email, entry);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
