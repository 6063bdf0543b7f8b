// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Delegated scope enforcement for federated tokens.

use super::claims::VerifiedClaims;
use super::error::AuthError;

/// Require at least one of `required` in the token's scopes.
///
/// An empty `required` list means scopes are not enforced.
pub fn require_scopes(claims: &VerifiedClaims, required: &[String]) -> Result<(), AuthError> {
    if required.is_empty() || required.iter().any(|s| claims.scopes.contains(s)) {
        return Ok(());
    }

    tracing::warn!(
        required = ?required,
        granted = ?claims.scopes,
        "Federated token lacks every required scope"
    );
    Err(AuthError::MissingScope)
}

/// Configured scope requirement.
#[derive(Debug, Clone, Default)]
pub struct ScopeAuthorizer {
    required: Vec<String>,
}

impl ScopeAuthorizer {
    pub fn new(required: Vec<String>) -> Self {
        Self { required }
    }

    /// Parse a comma-separated scope list, ignoring blanks.
    pub fn from_csv(csv: &str) -> Self {
        Self::new(
            csv.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_enforced(&self) -> bool {
        !self.required.is_empty()
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn authorize(&self, claims: &VerifiedClaims) -> Result<(), AuthError> {
        require_scopes(claims, &self.required)
    }
}
