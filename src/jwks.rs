//! Signing key set (JWKS) fetching and caching
//!
//! Session tokens are verified against the project's published JWKS. The
//! key set is fetched once and cached in memory; a token referencing a key
//! id that is not in the cached set forces an early refetch, so provider
//! key rotation does not require a process restart. Early refetches are
//! rate-limited to avoid hammering the endpoint when garbage tokens arrive.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet};

use crate::error::{DescopeMcpError, Result};

/// Timeout for JWKS endpoint requests
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a fetched key set stays fresh
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Minimum spacing between early refetches triggered by unknown key ids
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// In-memory cache in front of a JWKS endpoint
#[derive(Debug)]
pub struct JwksCache {
    url: String,
    ttl: Duration,
    cached: RwLock<Option<CachedKeys>>,
}

impl JwksCache {
    /// Create a cache for the given JWKS URL with the default TTL
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_ttl(url, JWKS_CACHE_TTL)
    }

    /// Create a cache with an explicit TTL
    pub fn with_ttl(url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            url: url.into(),
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// The JWKS endpoint this cache reads from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Look up the signing key for `kid`, fetching or refreshing the key
    /// set as needed
    ///
    /// # Errors
    ///
    /// Returns a provider error when the endpoint cannot be reached, when
    /// the response does not parse as a key set, or when `kid` is absent
    /// from a freshly fetched set.
    pub async fn find_key(&self, http: &reqwest::Client, kid: &str) -> Result<Jwk> {
        if let Some(cached) = self.snapshot() {
            if cached.fetched_at.elapsed() < self.ttl {
                if let Some(key) = find_kid(&cached.keys, kid) {
                    return Ok(key);
                }
                // Fresh set without this kid: refetch once for key rotation,
                // but not more often than the refresh interval allows.
                if cached.fetched_at.elapsed() < self.refresh_interval() {
                    return Err(unknown_key_error(kid));
                }
                tracing::debug!(kid = %kid, "key id not in cached JWKS, refetching");
            }
        }

        let keys = self.refresh(http).await?;
        match find_kid(&keys, kid) {
            Some(key) => Ok(key),
            None => Err(unknown_key_error(kid)),
        }
    }

    /// Drop any cached key set, forcing a fetch on the next lookup
    pub fn clear(&self) {
        if let Ok(mut guard) = self.cached.write() {
            *guard = None;
        }
    }

    async fn refresh(&self, http: &reqwest::Client) -> Result<JwkSet> {
        tracing::debug!(url = %self.url, "fetching JWKS");
        let response = http
            .get(&self.url)
            .timeout(JWKS_FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| DescopeMcpError::Provider(format!("signing key fetch failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DescopeMcpError::Provider(format!(
                "signing key endpoint returned {}",
                status
            ))
            .into());
        }

        let keys: JwkSet = response.json().await.map_err(|e| {
            DescopeMcpError::Provider(format!("signing key response malformed: {}", e))
        })?;
        tracing::debug!(count = keys.keys.len(), "JWKS fetched");

        let mut guard = self.cached.write().map_err(|_| {
            DescopeMcpError::Provider("failed to acquire signing key cache lock".to_string())
        })?;
        *guard = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }

    fn snapshot(&self) -> Option<CachedKeys> {
        if let Ok(guard) = self.cached.read() {
            guard.clone()
        } else {
            None
        }
    }

    fn refresh_interval(&self) -> Duration {
        MIN_REFRESH_INTERVAL.min(self.ttl)
    }
}

fn find_kid(keys: &JwkSet, kid: &str) -> Option<Jwk> {
    keys.keys
        .iter()
        .find(|key| key.common.key_id.as_deref() == Some(kid))
        .cloned()
}

fn unknown_key_error(kid: &str) -> anyhow::Error {
    DescopeMcpError::Provider(format!("invalid token: signing key '{}' not found", kid)).into()
}
