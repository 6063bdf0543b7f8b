// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password login and token diagnostics.

use axum::{extract::State, Form, Json};

use crate::auth::password::DUMMY_DIGEST;
use crate::auth::{validate_minimal, AuthError};
use crate::error::ApiError;
use crate::models::{InspectRequest, InspectResponse, LoginRequest, TokenResponse};
use crate::state::AppState;

/// Exchange a username and password for a local access token.
#[utoipa::path(
    post,
    path = "/token",
    tag = "Auth",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Access token issued", body = TokenResponse),
        (status = 401, description = "Incorrect username or password"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let account = state.accounts.find_by_username(&form.username).await?;

    // Unknown users are checked against a dummy digest so the response time
    // does not depend on whether the username exists.
    let digest = account
        .as_ref()
        .and_then(|a| a.credential_digest.clone())
        .unwrap_or_else(|| DUMMY_DIGEST.to_string());
    let hasher = state.hasher.clone();
    let password = form.password;
    let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
        .await
        .map_err(|e| AuthError::InternalError(format!("Password verification task failed: {e}")))?;

    let account = match account {
        Some(account) if verified && !account.is_disabled => account,
        _ => {
            tracing::warn!(username = %form.username, "Password login rejected");
            return Err(AuthError::InvalidCredentials);
        }
    };

    let token = state.issuer.issue(&account.username)?;
    tracing::info!(username = %account.username, "Issued local access token");
    Ok(Json(TokenResponse::bearer(token, state.issuer.lifetime_secs())))
}

/// Structural check of a token without verifying its signature.
///
/// For diagnostics only: the response says nothing about whether the token
/// would authenticate.
#[utoipa::path(
    post,
    path = "/v1/auth/inspect",
    tag = "Auth",
    request_body = InspectRequest,
    responses(
        (status = 200, description = "Unverified token contents", body = InspectResponse),
        (status = 400, description = "Not a structurally valid token"),
    )
)]
pub async fn inspect_token(
    Json(request): Json<InspectRequest>,
) -> Result<Json<InspectResponse>, ApiError> {
    let token = validate_minimal(request.token.trim())
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(token.into()))
}
