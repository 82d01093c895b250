//! Signing key set fetching and caching
//!
//! - **TTL-based caching**: keys are reused for 10 minutes
//! - **Refresh on unknown key id**: one forced fetch handles key rotation
//! - **Rate limiting**: forced fetches are at least 5 seconds apart
//! - **Single flight**: concurrent misses wait for one fetch and share its result
//!
//! HTTPS is required for the key set location (plain HTTP only to loopback).

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::Rejection;
use crate::http_client::{HttpClientError, SharedHttpClient, is_secure_or_loopback};

/// Key set cache lifetime
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Minimum spacing between forced refreshes
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Key set fetch errors
#[derive(Debug, Error)]
pub enum JwksError {
    /// Key set location is not HTTPS
    #[error("JWKS endpoint must use HTTPS (HTTP only allowed for loopback): {0}")]
    InsecureEndpoint(String),

    /// Network failure or timeout
    #[error("JWKS fetch failed: {0}")]
    Request(String),

    /// Endpoint answered with a non-success status
    #[error("JWKS endpoint returned status {0}")]
    Status(u16),

    /// Body is not a JWK set
    #[error("Invalid JWKS format: {0}")]
    Format(String),

    /// Shared HTTP client unavailable
    #[error(transparent)]
    Http(#[from] HttpClientError),
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    cached_at: Instant,
}

/// Client for a provider's published signing keys
#[derive(Debug, Clone)]
pub struct JwksClient {
    jwks_uri: String,
    http: SharedHttpClient,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    /// Held for the whole of a fetch; records when the last one started
    last_refresh: Arc<Mutex<Option<Instant>>>,
}

impl JwksClient {
    /// Create a client with the default TTL and refresh interval
    pub fn new(jwks_uri: impl Into<String>, http: SharedHttpClient) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            http,
            cache: Arc::new(RwLock::new(None)),
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            last_refresh: Arc::new(Mutex::new(None)),
        }
    }

    /// Override the cache lifetime
    pub fn with_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Override the forced refresh spacing
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Key set location
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Get the key set, from cache when fresh
    ///
    /// # Errors
    ///
    /// Returns [`JwksError`] when a fetch is needed and fails.
    pub async fn get_jwks(&self) -> Result<JwkSet, JwksError> {
        if let Some(jwks) = self.fresh_cached().await {
            return Ok(jwks);
        }

        let mut last_refresh = self.last_refresh.lock().await;
        // Another task may have filled the cache while we waited
        if let Some(jwks) = self.fresh_cached().await {
            return Ok(jwks);
        }
        self.fetch_and_cache(&mut last_refresh).await
    }

    /// Fetch the key set ignoring the cache, subject to rate limiting
    ///
    /// Inside the minimum refresh interval the cached set is returned instead.
    ///
    /// # Errors
    ///
    /// Returns [`JwksError`] if the fetch fails.
    pub async fn refresh(&self) -> Result<JwkSet, JwksError> {
        let mut last_refresh = self.last_refresh.lock().await;
        if let Some(last) = *last_refresh
            && last.elapsed() < self.min_refresh_interval
        {
            warn!(
                jwks_uri = %self.jwks_uri,
                since_last_ms = last.elapsed().as_millis(),
                "JWKS refresh rate limited, using cache"
            );
            if let Some(jwks) = self.fresh_cached().await {
                return Ok(jwks);
            }
        }

        self.fetch_and_cache(&mut last_refresh).await
    }

    async fn fresh_cached(&self) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.cached_at.elapsed() < self.cache_ttl)
            .map(|cached| {
                debug!(jwks_uri = %self.jwks_uri, "Using cached JWKS");
                cached.jwks.clone()
            })
    }

    /// Resolve the verification key for a key id
    ///
    /// An unknown `kid` triggers one forced refresh before giving up.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::KeySetUnavailable`] if the key set cannot be
    /// fetched, [`Rejection::UnknownKey`] if the id is still absent after the
    /// refresh, or [`Rejection::InvalidSignature`] if the key is unusable.
    pub async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, Rejection> {
        let jwks = self
            .get_jwks()
            .await
            .map_err(|e| Rejection::KeySetUnavailable(e.to_string()))?;

        if let Some(jwk) = jwks.find(kid) {
            return DecodingKey::from_jwk(jwk)
                .map_err(|e| Rejection::InvalidSignature(format!("unusable key '{kid}': {e}")));
        }

        debug!(kid = %kid, "Key id not in cached JWKS, refreshing");
        let jwks = self
            .refresh()
            .await
            .map_err(|e| Rejection::KeySetUnavailable(e.to_string()))?;

        let jwk = jwks.find(kid).ok_or_else(|| {
            warn!(kid = %kid, jwks_uri = %self.jwks_uri, "Key id not found after JWKS refresh");
            Rejection::UnknownKey(kid.to_string())
        })?;

        DecodingKey::from_jwk(jwk)
            .map_err(|e| Rejection::InvalidSignature(format!("unusable key '{kid}': {e}")))
    }

    /// Caller holds the refresh lock for the duration of the fetch
    async fn fetch_and_cache(
        &self,
        last_refresh: &mut Option<Instant>,
    ) -> Result<JwkSet, JwksError> {
        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS from endpoint");
        *last_refresh = Some(Instant::now());

        let secure = Url::parse(&self.jwks_uri)
            .map(|url| is_secure_or_loopback(&url))
            .unwrap_or(false);
        if !secure {
            return Err(JwksError::InsecureEndpoint(self.jwks_uri.clone()));
        }

        let response = self
            .http
            .get()?
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| {
                error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                JwksError::Request(e.to_string())
            })?;

        if !response.status().is_success() {
            error!(
                jwks_uri = %self.jwks_uri,
                status = %response.status(),
                "JWKS endpoint returned error status"
            );
            return Err(JwksError::Status(response.status().as_u16()));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS JSON");
            JwksError::Format(e.to_string())
        })?;

        info!(
            jwks_uri = %self.jwks_uri,
            key_count = jwks.keys.len(),
            "Fetched JWKS"
        );

        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            jwks: jwks.clone(),
            cached_at: Instant::now(),
        });

        Ok(jwks)
    }
}
