// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Authenticates once for a whole router subtree and stores the resolved
//! [`AuthenticatedUser`] in request extensions, where the [`Auth`] extractor
//! picks it up without authenticating again.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/users/me", get(get_current_user))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware));
//! ```
//!
//! [`Auth`]: super::Auth

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::extractor::bearer_token;
use super::AuthenticatedUser;
use crate::state::AppState;

/// Authentication middleware function.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(request.headers()) {
        Ok(token) => token,
        Err(e) => return e.into_response(),
    };

    match state.authenticator.authenticate(token).await {
        Ok(account) => {
            request
                .extensions_mut()
                .insert(AuthenticatedUser::from(account));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
