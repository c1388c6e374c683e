// ABOUTME: Identity provider clients and the provider dispatch registry
// ABOUTME: Shared wire types and checks for the authorization-code exchange protocol
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # Identity Provider Clients
//!
//! One client per provider, polymorphic over the capability set
//! {build login URL, exchange code, validate scope}. Clients are
//! constructed once at startup and selected through a provider-keyed
//! [`ProviderRegistry`] — an explicit map, not a dynamic registry.

pub mod github;
pub mod google;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::IdpConfig;
use crate::errors::{AuthError, AuthResult};
use crate::jwks::JwksCache;
use crate::models::{OAuthIdentity, Provider};
use crate::state::StateToken;

/// Token-endpoint response body, shared by both providers.
///
/// Every field is optional so violations surface as specific errors
/// rather than decode failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenExchangeResponse {
    /// Provider access token.
    pub access_token: Option<String>,
    /// Must be "bearer", case-insensitive.
    pub token_type: Option<String>,
    /// Granted scope (space- or comma-delimited, provider-dependent).
    pub scope: Option<String>,
    /// Seconds until the access token expires.
    pub expires_in: Option<i64>,
    /// Refresh token, when offline access was requested.
    pub refresh_token: Option<String>,
    /// OIDC id_token.
    pub id_token: Option<String>,
}

/// A provider-specific login/exchange client.
#[async_trait]
pub trait IdentityProviderClient: Send + Sync {
    /// Provider this client talks to.
    fn provider(&self) -> Provider;

    /// Authorization-endpoint URL for the given login attempt.
    fn build_login_url(&self, token: &StateToken) -> String;

    /// Require every requested scope to be present in the grant,
    /// accounting for provider-specific aliasing.
    ///
    /// # Errors
    /// Returns [`AuthError::Scope`] naming the missing entries.
    fn validate_scope(&self, granted_scope: &str) -> AuthResult<()>;

    /// Exchange an authorization code for a normalized identity.
    ///
    /// Either fully succeeds with an [`OAuthIdentity`] or fails with
    /// one of the named error kinds; no partial identity is returned.
    async fn exchange_code(&self, code: &str, token: &StateToken) -> AuthResult<OAuthIdentity>;
}

/// Provider-keyed dispatch table, built once at startup.
pub struct ProviderRegistry {
    clients: HashMap<Provider, Box<dyn IdentityProviderClient>>,
}

impl ProviderRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Build the registry from configuration, registering a client for
    /// each provider whose credentials are configured.
    #[must_use]
    pub fn from_config(config: &IdpConfig, jwks: Arc<JwksCache>, http: &reqwest::Client) -> Self {
        let mut registry = Self::new();
        if let Some(google) = &config.google {
            registry.register(Box::new(google::GoogleClient::new(
                google,
                jwks,
                http.clone(),
            )));
        }
        if let Some(github) = &config.github {
            registry.register(Box::new(github::GithubClient::new(github, http.clone())));
        }
        registry
    }

    /// Register a provider client.
    pub fn register(&mut self, client: Box<dyn IdentityProviderClient>) {
        info!(provider = %client.provider(), "registering identity provider client");
        self.clients.insert(client.provider(), client);
    }

    /// Client for `provider`, if one is registered.
    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<&dyn IdentityProviderClient> {
        self.clients.get(&provider).map(AsRef::as_ref)
    }

    /// Providers with a registered client.
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        self.clients.keys().copied().collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Require `access_token` plus a case-insensitive bearer `token_type`,
/// returning the access token.
///
/// # Errors
/// Returns [`AuthError::Provider`] on any violation.
pub(crate) fn require_bearer(
    auth: &TokenExchangeResponse,
    provider: Provider,
) -> AuthResult<&str> {
    let access_token = auth
        .access_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::Provider(format!("{provider} token response missing access_token")))?;

    match auth.token_type.as_deref() {
        Some(token_type) if token_type.eq_ignore_ascii_case("bearer") => Ok(access_token),
        other => Err(AuthError::Provider(format!(
            "{provider} token response token_type {other:?} != bearer"
        ))),
    }
}

/// Percent-encode query parameters into `k=v&k=v` form.
pub(crate) fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_bearer_accepts_any_case() {
        for token_type in ["bearer", "Bearer", "BEARER"] {
            let auth = TokenExchangeResponse {
                access_token: Some("at".into()),
                token_type: Some(token_type.into()),
                ..TokenExchangeResponse::default()
            };
            assert_eq!(require_bearer(&auth, Provider::Github).unwrap(), "at");
        }
    }

    #[test]
    fn require_bearer_rejects_missing_or_wrong_fields() {
        let missing = TokenExchangeResponse::default();
        assert!(matches!(
            require_bearer(&missing, Provider::Google),
            Err(AuthError::Provider(_))
        ));

        let wrong = TokenExchangeResponse {
            access_token: Some("at".into()),
            token_type: Some("mac".into()),
            ..TokenExchangeResponse::default()
        };
        assert!(matches!(
            require_bearer(&wrong, Provider::Google),
            Err(AuthError::Provider(_))
        ));
    }

    #[test]
    fn encode_query_escapes_values() {
        let encoded = encode_query(&[("redirect_uri", "http://localhost/auth"), ("scope", "a b")]);
        assert_eq!(
            encoded,
            "redirect_uri=http%3A%2F%2Flocalhost%2Fauth&scope=a%20b"
        );
    }
}
