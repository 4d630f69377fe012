//! JWKS cache for Supabase JWT verification

use anyhow::{Context, Result};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Claims;

/// Minimum gap between two JWKS fetches
const REFETCH_COOLDOWN: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

#[derive(Clone)]
struct CachedKey {
    key: DecodingKey,
    cached_at: Instant,
}

/// JWKS cache for validating Supabase JWTs
#[derive(Clone)]
pub struct JwksCache {
    inner: Arc<RwLock<JwksCacheInner>>,
    http: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
    ttl: Duration,
}

#[derive(Default)]
struct JwksCacheInner {
    keys: HashMap<String, CachedKey>,
    last_fetch: Option<Instant>,
}

impl JwksCacheInner {
    /// Store the RSA keys of a key set, returning how many were accepted.
    fn store(&mut self, jwks: JwksResponse) -> usize {
        let now = Instant::now();
        let mut stored = 0;
        for jwk in jwks.keys {
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                continue;
            };
            if jwk.kty != "RSA" {
                continue;
            }
            match DecodingKey::from_rsa_components(n, e) {
                Ok(key) => {
                    self.keys.insert(jwk.kid, CachedKey { key, cached_at: now });
                    stored += 1;
                }
                Err(err) => tracing::warn!(kid = %jwk.kid, error = %err, "Failed to parse JWK"),
            }
        }
        stored
    }

    fn fresh_key(&self, kid: &str, ttl: Duration) -> Option<DecodingKey> {
        self.keys
            .get(kid)
            .filter(|c| c.cached_at.elapsed() < ttl)
            .map(|c| c.key.clone())
    }
}

impl JwksCache {
    pub fn new(
        http: reqwest::Client,
        jwks_url: String,
        issuer: String,
        audience: String,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(JwksCacheInner::default())),
            http,
            jwks_url,
            issuer,
            audience,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Verify a JWT token and return the claims
    pub async fn verify_token(&self, token: &str) -> Result<Claims> {
        let header = decode_header(token).context("Invalid JWT header")?;
        let kid = header.kid.context("JWT missing kid header")?;

        let decoding_key = self.get_or_fetch_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        let token_data =
            decode::<Claims>(token, &decoding_key, &validation).context("JWT validation failed")?;

        Ok(token_data.claims)
    }

    async fn get_or_fetch_key(&self, kid: &str) -> Result<DecodingKey> {
        if let Some(key) = self.inner.read().fresh_key(kid, self.ttl) {
            return Ok(key);
        }

        // Unknown or stale kid: the signing key may have rotated
        self.refresh_keys().await?;

        self.inner
            .read()
            .keys
            .get(kid)
            .map(|c| c.key.clone())
            .context("Key not found in JWKS")
    }

    async fn refresh_keys(&self) -> Result<()> {
        if let Some(last) = self.inner.read().last_fetch {
            if last.elapsed() < REFETCH_COOLDOWN {
                return Ok(());
            }
        }

        tracing::debug!(url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http
            .get(&self.jwks_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .context("Failed to fetch JWKS")?;

        if !response.status().is_success() {
            anyhow::bail!("JWKS fetch failed with status: {}", response.status());
        }

        let jwks: JwksResponse = response.json().await.context("Failed to parse JWKS")?;

        let mut cache = self.inner.write();
        cache.last_fetch = Some(Instant::now());
        let stored = cache.store(jwks);

        tracing::info!(stored, total = cache.keys.len(), "JWKS cache refreshed");
        Ok(())
    }

    /// Pre-warm the cache by fetching keys
    pub async fn warm_cache(&self) -> Result<()> {
        self.refresh_keys().await
    }
}
