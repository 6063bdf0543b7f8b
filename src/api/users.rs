// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, AuthenticatedUser, FederatedAuth, Role};
use crate::storage::AuthMethod;

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Account id
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    /// How the account signs in
    pub auth_method: AuthMethod,
}

impl From<AuthenticatedUser> for UserMeResponse {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            role: user.role,
            unit_id: user.unit_id,
            auth_method: user.auth_method,
        }
    }
}

/// Get the current authenticated user's information.
///
/// Accepts local and federated tokens.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "Forbidden - disabled account or missing scope"),
    )
)]
pub async fn get_current_user(Auth(user): Auth) -> Json<UserMeResponse> {
    Json(user.into())
}

/// Get the current user from a federated token only.
#[utoipa::path(
    get,
    path = "/v1/oidc/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - not a valid federated token"),
        (status = 403, description = "Forbidden - disabled account or missing scope"),
    )
)]
pub async fn get_current_federated_user(FederatedAuth(user): FederatedAuth) -> Json<UserMeResponse> {
    Json(user.into())
}
