// ABOUTME: Environment-driven configuration for providers, signing keys, and TTLs
// ABOUTME: Secrets are fingerprinted for diagnostics, never logged in the clear
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # Configuration
//!
//! Environment-only configuration: each section has a `from_env()`
//! constructor and a provider is enabled iff both its client id and
//! secret are present. Signing keys come either inline
//! (`JWT_PRIVATE_KEY_PEM`) or from file mounts
//! (`JWT_PRIVATE_KEY_PATH`), the latter being the production shape.

use std::env;
use std::fs;

use anyhow::Context;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::constants::{limits, scopes, service, token_expiry};

/// Credentials and request parameters for one identity provider.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
    /// Scope string requested at login.
    pub scope: String,
    /// Request offline access (refresh token) from OIDC providers.
    pub offline_access: bool,
}

impl ProviderCredentials {
    /// SHA-256 fingerprint of the client secret (first 8 hex chars),
    /// so configurations can be compared without logging the value.
    #[must_use]
    pub fn secret_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.client_secret.as_bytes());
        format!("{:x}", hasher.finalize()).chars().take(8).collect()
    }

    /// Log credential diagnostics and flag suspicious values.
    pub fn validate_and_log(&self, provider_name: &str) -> bool {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            warn!("identity provider {provider_name}: client credentials are empty");
            return false;
        }
        info!(
            "identity provider {provider_name}: client_id={}, secret_fingerprint={}",
            self.client_id,
            self.secret_fingerprint()
        );
        if self.client_secret.len() < 20 {
            warn!(
                "identity provider {provider_name}: client_secret is unusually short ({} chars)",
                self.client_secret.len()
            );
            return false;
        }
        true
    }
}

/// Identity provider configuration. A provider is `None` when its
/// credentials are not configured; the registry simply skips it.
#[derive(Debug, Clone, Default)]
pub struct IdpConfig {
    /// Google OIDC credentials.
    pub google: Option<ProviderCredentials>,
    /// GitHub OAuth2 credentials.
    pub github: Option<ProviderCredentials>,
}

impl IdpConfig {
    /// Load provider configuration from the environment.
    ///
    /// One redirect URI (`AUTH_REDIRECT_URI`) is shared by all
    /// providers; the callback distinguishes them through the stored
    /// state token.
    #[must_use]
    pub fn from_env() -> Self {
        let redirect_uri = env::var("AUTH_REDIRECT_URI")
            .unwrap_or_else(|_| "http://localhost:8080/auth".to_owned());

        let google = load_provider(
            "GOOGLE",
            &redirect_uri,
            scopes::GOOGLE_LOGIN,
            env::var("GOOGLE_OFFLINE_ACCESS").is_ok_and(|v| v == "true" || v == "1"),
        );
        let github = load_provider("GITHUB", &redirect_uri, scopes::GITHUB_LOGIN, false);

        Self { google, github }
    }
}

fn load_provider(
    prefix: &str,
    redirect_uri: &str,
    default_scope: &str,
    offline_access: bool,
) -> Option<ProviderCredentials> {
    let client_id = env::var(format!("{prefix}_CLIENT_ID")).ok()?;
    let client_secret = env::var(format!("{prefix}_CLIENT_SECRET")).ok()?;
    let scope =
        env::var(format!("{prefix}_LOGIN_SCOPE")).unwrap_or_else(|_| default_scope.to_owned());

    Some(ProviderCredentials {
        client_id,
        client_secret,
        redirect_uri: redirect_uri.to_owned(),
        scope,
        offline_access,
    })
}

/// Service token signing configuration.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Fixed `iss` claim.
    pub issuer: String,
    /// RSA private key, PEM.
    pub private_key_pem: String,
    /// RSA public key, PEM.
    pub public_key_pem: String,
    /// Access token TTL in minutes. Must stay below the refresh TTL.
    pub access_ttl_minutes: i64,
    /// Refresh token TTL in minutes.
    pub refresh_ttl_minutes: i64,
    /// Exchange token TTL in minutes.
    pub exchange_ttl_minutes: i64,
}

impl JwtConfig {
    /// Configuration with default TTLs for the given key pair.
    #[must_use]
    pub fn new(private_key_pem: String, public_key_pem: String) -> Self {
        Self {
            issuer: service::TOKEN_ISSUER.to_owned(),
            private_key_pem,
            public_key_pem,
            access_ttl_minutes: token_expiry::ACCESS_TTL_MINUTES,
            refresh_ttl_minutes: token_expiry::REFRESH_TTL_MINUTES,
            exchange_ttl_minutes: token_expiry::EXCHANGE_TTL_MINUTES,
        }
    }

    /// Load signing configuration from the environment.
    ///
    /// # Errors
    /// Fails when no key material is configured or a key file cannot
    /// be read.
    pub fn from_env() -> anyhow::Result<Self> {
        let private_key_pem = load_pem("JWT_PRIVATE_KEY")?;
        let public_key_pem = load_pem("JWT_PUBLIC_KEY")?;

        let mut config = Self::new(private_key_pem, public_key_pem);
        if let Ok(issuer) = env::var("TOKEN_ISSUER") {
            config.issuer = issuer;
        }
        config.access_ttl_minutes = env_minutes("ACCESS_TOKEN_TTL_MINUTES", config.access_ttl_minutes);
        config.refresh_ttl_minutes =
            env_minutes("REFRESH_TOKEN_TTL_MINUTES", config.refresh_ttl_minutes);
        config.exchange_ttl_minutes =
            env_minutes("EXCHANGE_TOKEN_TTL_MINUTES", config.exchange_ttl_minutes);

        Ok(config)
    }
}

/// Read `<NAME>_PEM` inline or `<NAME>_PATH` from a file mount.
fn load_pem(name: &str) -> anyhow::Result<String> {
    if let Ok(pem) = env::var(format!("{name}_PEM")) {
        return Ok(pem);
    }
    let path = env::var(format!("{name}_PATH"))
        .with_context(|| format!("neither {name}_PEM nor {name}_PATH is set"))?;
    fs::read_to_string(&path).with_context(|| format!("reading {name}_PATH file {path}"))
}

fn env_minutes(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Identity provider credentials.
    pub idp: IdpConfig,
    /// Token signing configuration.
    pub jwt: JwtConfig,
    /// Lifetime of pending login state tokens, minutes.
    pub state_token_ttl_minutes: i64,
    /// JWKS cache refresh interval, seconds.
    pub jwks_refresh_secs: i64,
}

impl ServiceConfig {
    /// Load the full configuration from the environment.
    ///
    /// # Errors
    /// Fails when token signing keys are missing or unreadable.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            idp: IdpConfig::from_env(),
            jwt: JwtConfig::from_env()?,
            state_token_ttl_minutes: limits::STATE_TOKEN_TTL_MINUTES,
            jwks_refresh_secs: limits::JWKS_REFRESH_SECONDS,
        })
    }
}
