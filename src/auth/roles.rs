// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account roles for authorization.
///
/// ## Roles
///
/// - `Admin` - Full access to every unit and endpoint
/// - `UnitAdmin` - Manages the units they are attached to
/// - `Staff` - Works tasks within their unit (default for federated sign-up)
/// - `User` - Read-only member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Administrator of one or more units
    UnitAdmin,
    /// Regular staff member
    Staff,
    /// Read-only member
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::UnitAdmin => write!(f, "unit_admin"),
            Role::Staff => write!(f, "staff"),
            Role::User => write!(f, "user"),
        }
    }
}
