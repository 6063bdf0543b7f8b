// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Behaviour
//!
//! - Keys are cached for `max(ttl, 60s)`; the floor prevents refresh storms
//! - Fetches time out after 5 seconds
//! - On fetch failure the last good key set is served, even if expired
//! - An unknown `kid` forces one refresh before the key is rejected, unless
//!   the cached key set is younger than the refresh cooldown (30 seconds)
//!
//! ## Concurrency
//!
//! The cached key set is an immutable [`KeySetSnapshot`] behind an
//! [`ArcSwapOption`]. Readers load it without locking; a refresh builds a new
//! snapshot and swaps it in. Refreshes themselves are serialized so that
//! concurrent misses trigger a single fetch. While a refresh is in flight,
//! readers holding an expired snapshot are served from it instead of waiting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::{Mutex, MutexGuard};

use super::error::AuthError;

/// Default JWKS cache TTL (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Lower bound applied to any configured TTL.
pub const MIN_CACHE_TTL: Duration = Duration::from_secs(60);

/// Minimum age of the cached key set before an unknown `kid` may force a
/// refresh.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

/// Timeout for a single key-set fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Immutable view of a fetched key set.
#[derive(Clone)]
pub struct KeySetSnapshot {
    keys: JwkSet,
    fetched_at: Instant,
    expires_at: Instant,
}

impl KeySetSnapshot {
    fn new(keys: JwkSet, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            keys,
            fetched_at: now,
            expires_at: now + ttl,
        }
    }

    /// Look up a key by id.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
    }

    /// Whether the snapshot is still within its TTL.
    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }

    /// Time since this snapshot was fetched.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn len(&self) -> usize {
        self.keys.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.keys.is_empty()
    }
}

/// JWKS manager with caching.
///
/// Fetches and caches the identity provider's signing keys for federated
/// token verification.
pub struct JwksManager {
    /// JWKS URL
    jwks_url: String,
    /// Cache TTL (already floored)
    cache_ttl: Duration,
    /// Minimum snapshot age for a forced refresh
    refresh_cooldown: Duration,
    /// Last good key set
    cache: ArcSwapOption<KeySetSnapshot>,
    /// Serializes fetches
    refresh_lock: Mutex<()>,
    /// HTTP client
    client: reqwest::Client,
}

impl JwksManager {
    /// Create a new JWKS manager with the default TTL.
    ///
    /// # Arguments
    /// - `jwks_url`: The JWKS endpoint URL (e.g., `https://login.example.com/common/discovery/v2.0/keys`)
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AuthError::InternalError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            cache: ArcSwapOption::empty(),
            refresh_lock: Mutex::new(()),
            client,
        })
    }

    /// Create with custom cache TTL. Values below 60 seconds are raised to 60.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl.max(MIN_CACHE_TTL);
        self
    }

    /// Override the forced-refresh cooldown.
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Effective cache TTL.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Current key set, refreshing it when missing or expired.
    ///
    /// Fails only when nothing is cached and the fetch fails.
    pub async fn get(&self) -> Result<Arc<KeySetSnapshot>, AuthError> {
        match self.cache.load_full() {
            Some(snapshot) if snapshot.is_fresh() => Ok(snapshot),
            Some(snapshot) => match self.refresh_lock.try_lock() {
                Ok(guard) => self.refresh_from(guard, Some(&snapshot)).await,
                // Another task is fetching; serve the expired keys meanwhile.
                Err(_) => Ok(snapshot),
            },
            None => {
                let guard = self.refresh_lock.lock().await;
                self.refresh_from(guard, None).await
            }
        }
    }

    /// Get a decoding key for the given key ID.
    ///
    /// A miss forces one refresh when the cached key set is older than the
    /// refresh cooldown; a key id still absent is rejected with
    /// [`AuthError::UnknownKey`].
    pub async fn get_decoding_key(&self, kid: &str) -> Result<(DecodingKey, Algorithm), AuthError> {
        let snapshot = self.get().await?;
        if let Some(jwk) = snapshot.find(kid) {
            return jwk_to_decoding_key(jwk);
        }

        if snapshot.age() < self.refresh_cooldown {
            tracing::debug!(kid, "Key id not in recently fetched key set");
            return Err(AuthError::UnknownKey);
        }

        tracing::debug!(kid, "Key id not in cached key set, forcing refresh");
        let guard = self.refresh_lock.lock().await;
        let refreshed = self.refresh_from(guard, Some(&snapshot)).await?;
        let jwk = refreshed.find(kid).ok_or(AuthError::UnknownKey)?;
        jwk_to_decoding_key(jwk)
    }

    /// Force a fetch and replace the cache. Unlike [`JwksManager::get`],
    /// a failure is reported even when a stale key set exists.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let _guard = self.refresh_lock.lock().await;
        let keys = self.fetch_jwks().await?;
        self.cache
            .store(Some(Arc::new(KeySetSnapshot::new(keys, self.cache_ttl))));
        Ok(())
    }

    /// Expire the cached key set so the next lookup refetches it. The keys
    /// stay available as a fallback.
    pub fn mark_stale(&self) {
        if let Some(snapshot) = self.cache.load_full() {
            let mut stale = (*snapshot).clone();
            stale.expires_at = Instant::now();
            self.cache.store(Some(Arc::new(stale)));
        }
    }

    /// Fetch unless another task replaced `seen` while we waited for the
    /// refresh lock. Falls back to the cached value on fetch failure.
    async fn refresh_from(
        &self,
        _guard: MutexGuard<'_, ()>,
        seen: Option<&Arc<KeySetSnapshot>>,
    ) -> Result<Arc<KeySetSnapshot>, AuthError> {
        let current = self.cache.load_full();
        if let Some(current) = &current {
            let replaced = seen.is_none_or(|seen| !Arc::ptr_eq(seen, current));
            if replaced && current.is_fresh() {
                return Ok(Arc::clone(current));
            }
        }

        match self.fetch_jwks().await {
            Ok(keys) => {
                let snapshot = Arc::new(KeySetSnapshot::new(keys, self.cache_ttl));
                self.cache.store(Some(Arc::clone(&snapshot)));
                tracing::debug!(keys = snapshot.len(), "Refreshed JWKS");
                Ok(snapshot)
            }
            Err(e) => match current {
                Some(stale) => {
                    tracing::warn!(
                        error = %e,
                        age_secs = stale.age().as_secs(),
                        "JWKS fetch failed; using cached JWKS"
                    );
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksFetchError(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))
    }
}

/// Convert a JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), AuthError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| AuthError::InternalError(format!("Failed to create RSA key: {e}")))?;

            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                _ => Algorithm::RS256,
            };

            Ok((key, alg))
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|e| AuthError::InternalError(format!("Failed to create EC key: {e}")))?;

            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::ES384) => Algorithm::ES384,
                _ => Algorithm::ES256,
            };

            Ok((key, alg))
        }
        _ => Err(AuthError::InternalError(
            "Unsupported key type in JWKS".to_string(),
        )),
    }
}
