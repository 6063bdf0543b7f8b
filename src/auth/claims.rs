// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and the authenticated user representation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::roles::Role;
use crate::storage::{Account, AuthMethod};

/// Claims carried by a federated identity provider access token.
///
/// Only `exp` is mandatory at the decoding layer; every identity claim is
/// optional here and interpreted by [`VerifiedClaims`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FederatedClaims {
    /// Generic subject
    #[serde(default)]
    pub sub: Option<String>,
    /// Provider object id (stable per user, preferred over `sub`)
    #[serde(default)]
    pub oid: Option<String>,
    /// Tenant id
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// User principal name
    #[serde(default)]
    pub upn: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Space-delimited delegated scopes
    #[serde(default)]
    pub scp: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    pub exp: i64,
    /// Validated by jsonwebtoken, not read directly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
}

/// Claims of a federated token whose signature, audience and issuer have
/// been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    /// `oid` when present, else `sub`
    pub subject: Option<String>,
    pub tenant_id: Option<String>,
    /// First of `preferred_username`, `email`, `upn`
    pub email: Option<String>,
    pub preferred_username: Option<String>,
    /// First of `name`, `preferred_username`
    pub display_name: Option<String>,
    pub scopes: BTreeSet<String>,
    pub issuer: Option<String>,
    pub expiry: i64,
}

impl VerifiedClaims {
    pub fn from_claims(claims: FederatedClaims) -> Self {
        let subject = first_non_empty([&claims.oid, &claims.sub]);
        let tenant_id = first_non_empty([&claims.tid]);
        let email = first_non_empty([&claims.preferred_username, &claims.email, &claims.upn]);
        let display_name = first_non_empty([&claims.name, &claims.preferred_username]);
        let preferred_username = first_non_empty([&claims.preferred_username]);

        let scopes = claims
            .scp
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Self {
            subject,
            tenant_id,
            email,
            preferred_username,
            display_name,
            scopes,
            issuer: claims.iss,
            expiry: claims.exp,
        }
    }

    /// The federated identity key for account linking.
    pub fn federated_id(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// `lowercase(trim(email or federated id))`.
    pub fn linking_username(&self) -> Option<String> {
        self.email
            .as_deref()
            .or(self.federated_id())
            .map(|value| value.trim().to_lowercase())
    }
}

/// Return the first value that is a non-empty string after trimming.
fn first_non_empty<const N: usize>(candidates: [&Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Short, non-reversible fingerprint of an identifier for log lines.
pub fn fingerprint(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    digest[..6].iter().map(|b| format!("{b:02x}")).collect()
}

/// Resolved account information for the caller of a request.
///
/// This is the primary type handlers receive from the auth extractors.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Account id
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    pub auth_method: AuthMethod,
}

impl AuthenticatedUser {
    /// Check if this user is an admin.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&Account> for AuthenticatedUser {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            role: account.role,
            unit_id: account.unit_id.clone(),
            auth_method: account.auth_method,
        }
    }
}

impl From<Account> for AuthenticatedUser {
    fn from(account: Account) -> Self {
        Self::from(&account)
    }
}
