// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Roster Server - hybrid bearer authentication
//!
//! Accepts locally issued HMAC tokens and federated identity provider
//! tokens on the same API, and reconciles federated identities with durable
//! local accounts.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token validation, scope checks, identity reconciliation
//! - `config` - Environment configuration
//! - `storage` - Account persistence (JSON files or in-memory)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
