//! JWKS (JSON Web Key Set) fetching and caching
//!
//! Key material for platforms that publish their signing keys as a JWKS:
//!
//! - **TTL-based caching**: default 10 minutes
//! - **Refresh on unknown kid**: handles key rotation
//! - **Rate limiting**: at most one refresh per [`MIN_REFRESH_INTERVAL`]
//! - **Bounded fetches**: a fetch that cannot complete is an
//!   [`UpstreamUnavailable`], never a rejection
//!
//! HTTPS is required, except for loopback hosts.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use jsonwebtoken::jwk::{Jwk, JwkSet};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::{Host, Url};

use crate::error::{UnavailableKind, UpstreamUnavailable};

/// Default cache TTL
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Minimum spacing between forced refreshes
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Key set as published, before individual keys are parsed
#[derive(Debug, Deserialize)]
struct RawJwkSet {
    keys: Vec<Value>,
}

/// JWKS cache entry with metadata
#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    cached_at: SystemTime,
    ttl: Duration,
}

impl CachedJwks {
    fn is_valid(&self) -> bool {
        match SystemTime::now().duration_since(self.cached_at) {
            Ok(age) => age < self.ttl,
            Err(_) => false, // Clock went backwards, invalidate
        }
    }
}

/// JWKS client for one issuer's key set
#[derive(Debug, Clone)]
pub struct JwksClient {
    jwks_uri: Url,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    http_client: reqwest::Client,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    last_refresh: Arc<RwLock<Option<SystemTime>>>,
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(addr)) => addr.is_loopback(),
        Some(Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}

impl JwksClient {
    /// Create a JWKS client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(jwks_uri: Url, fetch_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(fetch_timeout)
            .build()?;

        Ok(Self {
            jwks_uri,
            cache: Arc::new(RwLock::new(None)),
            http_client,
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: MIN_REFRESH_INTERVAL,
            last_refresh: Arc::new(RwLock::new(None)),
        })
    }

    /// Set cache time-to-live
    ///
    /// Shorter TTL picks up key rotation sooner; longer TTL means fewer
    /// fetches.
    pub fn with_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Get JWKS (from cache or fetch if needed)
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable, answers with a
    /// non-success status, or returns something that is not a JWKS.
    pub async fn get_jwks(&self) -> Result<JwkSet, UpstreamUnavailable> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.is_valid()
            {
                debug!(jwks_uri = %self.jwks_uri, "Using cached JWKS");
                return Ok(cached.jwks.clone());
            }
        }

        self.fetch_and_cache().await
    }

    /// Force refresh JWKS (ignoring cache), rate limited
    ///
    /// If called within the minimum refresh interval, the cached value is
    /// returned instead.
    ///
    /// # Errors
    ///
    /// Same as [`JwksClient::get_jwks`].
    pub async fn refresh(&self) -> Result<JwkSet, UpstreamUnavailable> {
        {
            let last_refresh = self.last_refresh.read().await;
            if let Some(last) = *last_refresh
                && let Ok(since_last) = SystemTime::now().duration_since(last)
                && since_last < self.min_refresh_interval
            {
                warn!(
                    jwks_uri = %self.jwks_uri,
                    since_last_ms = since_last.as_millis(),
                    "JWKS refresh rate limited, using cache"
                );
                return self.get_jwks().await;
            }
        }

        self.fetch_and_cache().await
    }

    /// Find a key by id, refreshing once if the id is unknown
    ///
    /// # Errors
    ///
    /// Same as [`JwksClient::get_jwks`].
    pub async fn find_key(&self, kid: &str) -> Result<Option<Jwk>, UpstreamUnavailable> {
        let jwks = self.get_jwks().await?;
        if let Some(jwk) = jwks.find(kid) {
            return Ok(Some(jwk.clone()));
        }

        debug!(jwks_uri = %self.jwks_uri, kid, "Key ID not cached, refreshing JWKS");
        let jwks = self.refresh().await?;
        Ok(jwks.find(kid).cloned())
    }

    async fn fetch_and_cache(&self) -> Result<JwkSet, UpstreamUnavailable> {
        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS from endpoint");

        if self.jwks_uri.scheme() != "https" && !is_loopback(&self.jwks_uri) {
            return Err(UpstreamUnavailable::new(
                UnavailableKind::Transport,
                "JWKS endpoint must use HTTPS (HTTP only allowed for loopback)",
            ));
        }

        {
            let mut last_refresh = self.last_refresh.write().await;
            *last_refresh = Some(SystemTime::now());
        }

        let response = self
            .http_client
            .get(self.jwks_uri.clone())
            .send()
            .await
            .map_err(|e| {
                warn!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                UpstreamUnavailable::from_reqwest(&e)
            })?;

        if !response.status().is_success() {
            warn!(
                jwks_uri = %self.jwks_uri,
                status = %response.status(),
                "JWKS endpoint returned error status"
            );
            return Err(UpstreamUnavailable::new(
                UnavailableKind::Status(response.status().as_u16()),
                "JWKS endpoint returned error status",
            ));
        }

        let raw: RawJwkSet = response.json().await.map_err(|e| {
            warn!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS JSON");
            UpstreamUnavailable::new(UnavailableKind::Decode, format!("invalid JWKS: {e}"))
        })?;
        let jwks = self.usable_keys(raw);

        info!(
            jwks_uri = %self.jwks_uri,
            key_count = jwks.keys.len(),
            "Fetched JWKS"
        );

        {
            let mut cache = self.cache.write().await;
            *cache = Some(CachedJwks {
                jwks: jwks.clone(),
                cached_at: SystemTime::now(),
                ttl: self.cache_ttl,
            });
        }

        Ok(jwks)
    }

    // One unsupported entry must not take the rest of the set down with it
    fn usable_keys(&self, raw: RawJwkSet) -> JwkSet {
        let total = raw.keys.len();
        let keys: Vec<Jwk> = raw
            .keys
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Jwk>(entry) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    warn!(jwks_uri = %self.jwks_uri, error = %e, "Skipping unsupported JWK");
                    None
                }
            })
            .collect();
        if keys.len() < total {
            debug!(
                jwks_uri = %self.jwks_uri,
                skipped = total - keys.len(),
                "Dropped unsupported entries from JWKS"
            );
        }
        JwkSet { keys }
    }

    /// The JWKS endpoint
    pub fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }

    /// Drop the cached key set
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
        debug!(jwks_uri = %self.jwks_uri, "JWKS cache cleared");
    }
}
