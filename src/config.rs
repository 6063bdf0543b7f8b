// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Account storage directory; in-memory when unset | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `SECRET_KEY` | Shared secret for local tokens | Required |
//! | `ALGORITHM` | Local token algorithm (`HS256`, `HS384`, `HS512`) | `HS256` |
//! | `ACCESS_TOKEN_EXPIRE_MINUTES` | Local token lifetime | `30` |
//! | `OIDC_JWKS_URL` | Identity provider key-set endpoint | unset |
//! | `OIDC_AUDIENCE` | Expected federated token audience | unset |
//! | `OIDC_ISSUER` | Comma-separated issuer allow-list; empty allows any | empty |
//! | `OIDC_REQUIRED_SCOPES` | Comma-separated scopes, any one suffices | empty |
//! | `OIDC_JWKS_CACHE_TTL_SECONDS` | Key-set cache lifetime, floored at 60 | `3600` |
//! | `OIDC_OVERRIDES_FILE` | JSON identity override table | unset |
//! | `DEFAULT_UNIT_ID` | Unit for new federated accounts | `u3` |
//! | `SEED_ADMIN_USERNAME` / `SEED_ADMIN_PASSWORD` | Admin created at startup | unset |
//!
//! Federated sign-in is enabled only when both `OIDC_JWKS_URL` and
//! `OIDC_AUDIENCE` are set.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use thiserror::Error;
use url::Url;

use crate::auth::jwks::{DEFAULT_CACHE_TTL, MIN_CACHE_TTL};
use crate::auth::local::{is_hmac, DEFAULT_EXPIRE_MINUTES, MAX_EXPIRE_MINUTES};
use crate::auth::reconcile::DEFAULT_UNIT_ID;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error("Failed to read override table {path}: {source}")]
    OverridesIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid override table: {0}")]
    OverridesFormat(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Federated identity provider settings.
#[derive(Debug, Clone)]
pub struct FederatedSettings {
    pub jwks_url: String,
    pub audience: String,
    /// Empty means any issuer whose token verifies
    pub allowed_issuers: Vec<String>,
    /// Empty means scopes are not enforced
    pub required_scopes: Vec<String>,
    pub cache_ttl: Duration,
}

#[derive(Clone)]
pub struct SeedAdmin {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    pub log_format: LogFormat,
    pub secret_key: String,
    pub algorithm: Algorithm,
    pub access_token_expire_minutes: i64,
    pub federated: Option<FederatedSettings>,
    pub overrides_file: Option<PathBuf>,
    pub default_unit_id: String,
    pub seed_admin: Option<SeedAdmin>,
}

/// Secrets are redacted in Debug output.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("log_format", &self.log_format)
            .field("secret_key", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .field(
                "access_token_expire_minutes",
                &self.access_token_expire_minutes,
            )
            .field("federated", &self.federated)
            .field("overrides_file", &self.overrides_file)
            .field("default_unit_id", &self.default_unit_id)
            .field("seed_admin", &self.seed_admin)
            .finish()
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load settings from a map (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let secret_key = get("SECRET_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("SECRET_KEY".to_string()))?
            .to_string();

        let algorithm = match get("ALGORITHM") {
            Some(value) => {
                let algorithm =
                    Algorithm::from_str(value).map_err(|e| ConfigError::InvalidValue {
                        var: "ALGORITHM",
                        reason: format!("'{value}': {e}"),
                    })?;
                if !is_hmac(algorithm) {
                    return Err(ConfigError::InvalidValue {
                        var: "ALGORITHM",
                        reason: format!("'{value}' is not an HMAC algorithm"),
                    });
                }
                algorithm
            }
            None => Algorithm::HS256,
        };

        let access_token_expire_minutes = match get("ACCESS_TOKEN_EXPIRE_MINUTES") {
            Some(value) => {
                let minutes: i64 = value.parse().map_err(|e| ConfigError::InvalidValue {
                    var: "ACCESS_TOKEN_EXPIRE_MINUTES",
                    reason: format!("'{value}': {e}"),
                })?;
                if !(1..=MAX_EXPIRE_MINUTES).contains(&minutes) {
                    return Err(ConfigError::InvalidValue {
                        var: "ACCESS_TOKEN_EXPIRE_MINUTES",
                        reason: format!("must be between 1 and {MAX_EXPIRE_MINUTES}"),
                    });
                }
                minutes
            }
            None => DEFAULT_EXPIRE_MINUTES,
        };

        let port = match get("PORT") {
            Some(value) => value.parse().map_err(|e| ConfigError::InvalidValue {
                var: "PORT",
                reason: format!("'{value}': {e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let log_format = match get("LOG_FORMAT") {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let seed_admin = match (get("SEED_ADMIN_USERNAME"), get("SEED_ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(SeedAdmin {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => None,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(DEFAULT_HOST).to_string(),
            port,
            data_dir: get("DATA_DIR").map(PathBuf::from),
            log_format,
            secret_key,
            algorithm,
            access_token_expire_minutes,
            federated: federated_from_vars(&get)?,
            overrides_file: get("OIDC_OVERRIDES_FILE").map(PathBuf::from),
            default_unit_id: get("DEFAULT_UNIT_ID")
                .unwrap_or(DEFAULT_UNIT_ID)
                .to_string(),
            seed_admin,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn federated_from_vars<'a>(
    get: &impl Fn(&str) -> Option<&'a str>,
) -> Result<Option<FederatedSettings>, ConfigError> {
    let (Some(jwks_url), Some(audience)) = (get("OIDC_JWKS_URL"), get("OIDC_AUDIENCE")) else {
        return Ok(None);
    };
    validate_jwks_url(jwks_url)?;

    let cache_ttl = match get("OIDC_JWKS_CACHE_TTL_SECONDS") {
        Some(value) => {
            let secs: u64 = value.parse().map_err(|e| ConfigError::InvalidValue {
                var: "OIDC_JWKS_CACHE_TTL_SECONDS",
                reason: format!("'{value}': {e}"),
            })?;
            Duration::from_secs(secs).max(MIN_CACHE_TTL)
        }
        None => DEFAULT_CACHE_TTL,
    };

    Ok(Some(FederatedSettings {
        jwks_url: jwks_url.to_string(),
        audience: audience.to_string(),
        allowed_issuers: parse_csv(get("OIDC_ISSUER").unwrap_or_default()),
        required_scopes: parse_csv(get("OIDC_REQUIRED_SCOPES").unwrap_or_default()),
        cache_ttl,
    }))
}

/// Key sets must come over HTTPS; plain HTTP is tolerated for loopback only.
fn validate_jwks_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        var: "OIDC_JWKS_URL",
        reason: format!("'{raw}': {e}"),
    })?;

    let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
    match url.scheme() {
        "https" => Ok(()),
        "http" if loopback => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            var: "OIDC_JWKS_URL",
            reason: "must use https".to_string(),
        }),
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
