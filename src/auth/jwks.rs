// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Behaviour
//!
//! - A fresh key set (`now < expires_at`) is served without I/O
//! - A miss fetches from the provider with a bounded timeout
//! - A successful fetch replaces the cached set wholesale
//! - A failed fetch serves the previous set, however old, and only errors
//!   when nothing was ever cached
//! - Concurrent misses share a single in-flight fetch. Callers holding a
//!   stale set never wait on it; callers with nothing cached wait for that
//!   one attempt and take its outcome
//!
//! The fetcher and the clock are injected so tests can drive both.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::DecodingKey;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, error, warn};

use super::error::AuthError;

/// Default JWKS cache TTL (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default bound on a single key set fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Key set retrieval failure.
///
/// All variants are treated the same way by the stale-cache fallback.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("JWKS request failed: {0}")]
    Http(String),

    #[error("HTTP {0} from JWKS endpoint")]
    Status(u16),

    #[error("JWKS response was invalid: {0}")]
    Body(String),

    #[error("JWKS fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of the provider's key set.
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, FetchError>;
}

/// Wall clock used for cache expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fetches the key set over HTTPS from the provider's JWKS endpoint.
#[derive(Debug, Clone)]
pub struct HttpKeySetFetcher {
    jwks_url: String,
    client: reqwest::Client,
}

impl HttpKeySetFetcher {
    /// Create a fetcher for `jwks_url`
    /// (e.g. `https://<project>.supabase.co/auth/v1/jwks`).
    pub fn new(jwks_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        Ok(Self {
            jwks_url: jwks_url.into(),
            client,
        })
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    async fn fetch(&self) -> Result<JwkSet, FetchError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))
    }
}

/// JWKS cache entry. Never mutated after creation.
struct CacheEntry {
    keys: Arc<JwkSet>,
    expires_at: DateTime<Utc>,
}

/// Key material cache.
///
/// Cloning yields another handle to the same cache; production wiring builds
/// one per process and hands clones to the verifier.
#[derive(Clone)]
pub struct JwksCache {
    fetcher: Arc<dyn KeySetFetcher>,
    clock: Arc<dyn Clock>,
    cache_ttl: Duration,
    fetch_timeout: Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// Serializes refreshes. Holds the error of the last finished attempt,
    /// if it failed.
    refresh_gate: Arc<Mutex<Option<FetchError>>>,
    /// Number of finished refresh attempts, bumped under the gate.
    attempts: Arc<AtomicU64>,
}

impl JwksCache {
    /// Create an empty cache in front of `fetcher`.
    pub fn new(fetcher: Arc<dyn KeySetFetcher>) -> Self {
        Self {
            fetcher,
            clock: Arc::new(SystemClock),
            cache_ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            cache: Arc::new(RwLock::new(None)),
            refresh_gate: Arc::new(Mutex::new(None)),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a cache backed by [`HttpKeySetFetcher`].
    pub fn from_jwks_url(
        jwks_url: impl Into<String>,
        fetch_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let fetcher = HttpKeySetFetcher::new(jwks_url, fetch_timeout)?;
        Ok(Self::new(Arc::new(fetcher)).with_fetch_timeout(fetch_timeout))
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Create with a custom fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Create with a custom clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Get the current key set.
    ///
    /// Serves from cache while fresh. Otherwise fetches, and on failure falls
    /// back to the previous key set if there is one. While another caller is
    /// already refreshing, a stale set is returned at once instead of
    /// queueing behind that fetch.
    pub async fn get_keys(&self) -> Result<Arc<JwkSet>, FetchError> {
        if let Some(keys) = self.fresh_keys().await {
            return Ok(keys);
        }

        let mut gate = match self.cached_keys().await {
            Some(stale) => match self.refresh_gate.try_lock() {
                Ok(gate) => gate,
                Err(_) => {
                    debug!("JWKS refresh in flight, serving stale keys");
                    return Ok(stale);
                }
            },
            None => {
                let seen = self.attempts.load(Ordering::Acquire);
                let gate = self.refresh_gate.lock().await;

                // An attempt finished while we waited: take its outcome.
                if self.attempts.load(Ordering::Acquire) != seen {
                    return match self.cached_keys().await {
                        Some(keys) => Ok(keys),
                        None => Err((*gate)
                            .clone()
                            .unwrap_or_else(|| FetchError::Http("JWKS refresh failed".to_string()))),
                    };
                }
                gate
            }
        };

        // Another caller may have refreshed before we took the gate.
        if let Some(keys) = self.fresh_keys().await {
            return Ok(keys);
        }

        match self.attempt_refresh(&mut gate).await {
            Ok(keys) => Ok(keys),
            Err(e) => {
                error!(error = %e, "Failed to fetch JWKS");

                let cache = self.cache.read().await;
                match &*cache {
                    Some(entry) => {
                        warn!(
                            expired_at = %entry.expires_at,
                            "Using stale JWKS cache"
                        );
                        Ok(entry.keys.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Force refresh the JWKS cache. Errors are returned, not masked by
    /// stale data.
    pub async fn refresh(&self) -> Result<(), FetchError> {
        let mut gate = self.refresh_gate.lock().await;
        self.attempt_refresh(&mut gate).await.map(|_| ())
    }

    /// Check if JWKS is currently cached and fresh.
    pub async fn is_fresh(&self) -> bool {
        self.fresh_keys().await.is_some()
    }

    /// Get a decoding key for the given key ID.
    pub async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let jwks = self.get_keys().await?;

        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))?;

        rsa_decoding_key(kid, jwk)
    }

    async fn fresh_keys(&self) -> Option<Arc<JwkSet>> {
        let now = self.clock.now();
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.keys.clone())
    }

    async fn cached_keys(&self) -> Option<Arc<JwkSet>> {
        let cache = self.cache.read().await;
        cache.as_ref().map(|entry| entry.keys.clone())
    }

    /// Run one fetch while holding the gate and record its outcome for
    /// callers that waited on it.
    async fn attempt_refresh(
        &self,
        gate: &mut MutexGuard<'_, Option<FetchError>>,
    ) -> Result<Arc<JwkSet>, FetchError> {
        let result = self.fetch_and_store().await;
        **gate = result.as_ref().err().cloned();
        self.attempts.fetch_add(1, Ordering::Release);
        result
    }

    /// Fetch under the timeout and swap the result in. Caller holds the gate.
    async fn fetch_and_store(&self) -> Result<Arc<JwkSet>, FetchError> {
        let keys = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch())
            .await
            .map_err(|_| FetchError::Timeout(self.fetch_timeout))??;

        let keys = Arc::new(keys);
        let ttl = TimeDelta::from_std(self.cache_ttl).unwrap_or(TimeDelta::MAX);
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        {
            let mut cache = self.cache.write().await;
            *cache = Some(CacheEntry {
                keys: keys.clone(),
                expires_at,
            });
        }

        debug!(keys = keys.keys.len(), %expires_at, "JWKS cache refreshed");
        Ok(keys)
    }
}

/// Convert an RSA JWK to a DecodingKey. Anything else is unusable for RS256.
fn rsa_decoding_key(kid: &str, jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| {
                error!(kid, error = %e, "Failed to construct RSA key");
                AuthError::KeyNotFound(kid.to_string())
            }),
        _ => {
            warn!(kid, "JWKS entry is not an RSA key");
            Err(AuthError::KeyNotFound(kid.to_string()))
        }
    }
}
