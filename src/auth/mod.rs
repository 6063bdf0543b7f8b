// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Hybrid bearer authentication: locally issued HMAC tokens and federated
//! identity provider tokens resolve to the same local accounts.
//!
//! ## Auth Flow
//!
//! 1. Client sends `Authorization: Bearer <token>`
//! 2. The token is tried as a local token (shared secret, no network)
//! 3. Otherwise it is verified as a federated token:
//!    - Signing key looked up by `kid` in the cached provider JWKS
//!    - Signature, expiry and audience checked, then the issuer allow-list
//!    - Required scopes checked (any one suffices)
//!    - Claims reconciled to a local account (linked or provisioned)
//!
//! ## Security
//!
//! - Decisions about the caller (disabled account, missing scope, identity
//!   conflict, tenant mismatch) are returned as-is; other failures collapse
//!   into one generic 401
//! - JWKS is cached with TTL, refreshed single-flight, served stale when the
//!   provider is unreachable
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod federated;
pub mod hybrid;
pub mod jwks;
pub mod local;
pub mod middleware;
pub mod overrides;
pub mod password;
pub mod reconcile;
pub mod roles;
pub mod scopes;

#[cfg(test)]
pub(crate) mod test_support;

pub use claims::{AuthenticatedUser, VerifiedClaims};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, FederatedAuth, OptionalAuth};
pub use federated::{validate_minimal, FederatedTokenValidator, UnverifiedToken};
pub use hybrid::{FederatedAuthenticator, HybridAuthenticator};
pub use jwks::JwksManager;
pub use local::{LocalTokenIssuer, LocalTokenValidator};
pub use overrides::{IdentityOverride, OverridePolicy};
pub use password::{BcryptHasher, PasswordHasher};
pub use reconcile::IdentityReconciler;
pub use roles::Role;
pub use scopes::ScopeAuthorizer;
