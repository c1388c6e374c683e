// ABOUTME: JWKS (JSON Web Key Set) modelling and per-provider key caching
// ABOUTME: Staleness-based refresh with single-flight coalescing and stale-serve fallback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # JWKS Cache
//!
//! OIDC providers publish the public keys their id_tokens are signed
//! with as a JSON Web Key Set. Keys rotate, so the set is cached and
//! refetched once stale (one hour by default).
//!
//! Refresh behavior:
//! - concurrent staleness triggers a single fetch; other callers wait
//!   behind the refresh lock and reuse the result
//! - a failed refresh serves the previous key set when one exists
//! - a failed *first* fetch fails closed with `ProviderUnavailable` —
//!   there is no unverified fallback

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::DecodingKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::constants::limits;
use crate::errors::{AuthError, AuthResult};
use crate::models::Provider;

/// A single RSA public key in JWK form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type ("RSA" for the keys this service consumes).
    pub kty: String,
    /// Public key use ("sig" for signature keys).
    #[serde(rename = "use", default)]
    pub key_use: Option<String>,
    /// Key id, matched against the `kid` in token headers.
    #[serde(default)]
    pub kid: Option<String>,
    /// Algorithm the key is intended for.
    #[serde(default)]
    pub alg: Option<String>,
    /// RSA modulus, base64url without padding.
    pub n: String,
    /// RSA public exponent, base64url without padding.
    pub e: String,
}

impl JsonWebKey {
    /// Build a JWK from an RSA public key.
    #[must_use]
    pub fn from_rsa_public(kid: &str, key: &RsaPublicKey) -> Self {
        Self {
            kty: "RSA".into(),
            key_use: Some("sig".into()),
            kid: Some(kid.to_owned()),
            alg: Some("RS256".into()),
            n: URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        }
    }

    /// Decoding key for signature verification.
    ///
    /// # Errors
    /// Returns [`AuthError::Signature`] if the modulus or exponent is
    /// not valid base64url RSA material.
    pub fn decoding_key(&self) -> AuthResult<DecodingKey> {
        DecodingKey::from_rsa_components(&self.n, &self.e).map_err(|e| {
            AuthError::Signature(format!(
                "unusable JWKS key {}: {e}",
                self.kid.as_deref().unwrap_or("<no kid>")
            ))
        })
    }
}

/// A provider's published key set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Published public keys.
    pub keys: Vec<JsonWebKey>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    keys: JsonWebKeySet,
    stale_after: DateTime<Utc>,
}

/// Per-provider cache of JWKS key sets with staleness-based refresh.
pub struct JwksCache {
    http: reqwest::Client,
    refresh_interval: Duration,
    entries: RwLock<HashMap<Provider, CacheEntry>>,
    // Single-flight guard: concurrent stale readers refresh once.
    refresh_lock: Mutex<()>,
}

impl JwksCache {
    /// Create a cache with the default refresh interval.
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_refresh_interval(http, Duration::seconds(limits::JWKS_REFRESH_SECONDS))
    }

    /// Create a cache with an explicit refresh interval.
    #[must_use]
    pub fn with_refresh_interval(http: reqwest::Client, refresh_interval: Duration) -> Self {
        Self {
            http,
            refresh_interval,
            entries: RwLock::new(HashMap::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Seed the cache with a key set, marking it freshly fetched.
    ///
    /// Used for warm starts and for exercising validation offline.
    pub async fn prime(&self, provider: Provider, keys: JsonWebKeySet) {
        let entry = CacheEntry {
            keys,
            stale_after: Utc::now() + self.refresh_interval,
        };
        self.entries.write().await.insert(provider, entry);
    }

    /// Current verification keys for `provider`, fetching from
    /// `jwks_url` when the cached set is absent or stale.
    ///
    /// # Errors
    /// Returns [`AuthError::ProviderUnavailable`] when the fetch fails
    /// and no previously cached set exists to fall back on.
    pub async fn get_keys(&self, provider: Provider, jwks_url: &str) -> AuthResult<JsonWebKeySet> {
        let now = Utc::now();
        if let Some(entry) = self.entries.read().await.get(&provider) {
            if now <= entry.stale_after {
                return Ok(entry.keys.clone());
            }
        }

        let _refresh = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(entry) = self.entries.read().await.get(&provider) {
            if Utc::now() <= entry.stale_after {
                return Ok(entry.keys.clone());
            }
        }

        match self.fetch(jwks_url).await {
            Ok(keys) => {
                info!(provider = %provider, count = keys.keys.len(), "fetched JWKS key set");
                let entry = CacheEntry {
                    keys: keys.clone(),
                    stale_after: Utc::now() + self.refresh_interval,
                };
                self.entries.write().await.insert(provider, entry);
                Ok(keys)
            }
            Err(err) => {
                if let Some(entry) = self.entries.read().await.get(&provider) {
                    warn!(provider = %provider, %err, "JWKS refresh failed, serving stale key set");
                    return Ok(entry.keys.clone());
                }
                warn!(provider = %provider, %err, "JWKS fetch failed with no cached keys");
                Err(AuthError::ProviderUnavailable(err.to_string()))
            }
        }
    }

    async fn fetch(&self, jwks_url: &str) -> AuthResult<JsonWebKeySet> {
        let response = self
            .http
            .get(jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("JWKS endpoint {jwks_url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Provider(format!(
                "JWKS endpoint {jwks_url} returned {status}"
            )));
        }

        let keys: JsonWebKeySet = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("JWKS response decode: {e}")))?;

        if keys.keys.is_empty() {
            return Err(AuthError::Provider(format!(
                "JWKS endpoint {jwks_url} published an empty key set"
            )));
        }

        debug!(count = keys.keys.len(), "decoded JWKS response");
        Ok(keys)
    }
}
