// ABOUTME: Google OIDC identity provider client
// ABOUTME: Login URL construction, code exchange, id_token validation against Google's JWKS
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # Google OIDC Client
//!
//! Google login uses OpenID Connect: the token response carries an
//! id_token whose signature is checked against Google's published JWKS
//! and whose `nonce` claim must match the one minted into the login
//! state. Signature validation fails closed — an id_token no published
//! key validates is rejected outright.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{encode_query, require_bearer, IdentityProviderClient, TokenExchangeResponse};
use crate::config::ProviderCredentials;
use crate::constants::endpoints;
use crate::errors::{AuthError, AuthResult};
use crate::jwks::JwksCache;
use crate::models::{OAuthIdentity, Provider, ProviderGrant};
use crate::state::StateToken;

/// Claim set carried by a Google id_token. Fields beyond the standard
/// registered claims are optional; their absence is reported as a
/// specific error, not a decode failure.
#[derive(Debug, Deserialize)]
struct GoogleIdClaims {
    sub: Option<String>,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
    nonce: Option<String>,
}

/// Google OIDC login/exchange client.
pub struct GoogleClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scope: String,
    offline_access: bool,
    auth_url: String,
    token_url: String,
    jwks_url: String,
    id_token_iss: String,
    jwks: Arc<JwksCache>,
    http: reqwest::Client,
}

impl GoogleClient {
    /// Build a client from configured credentials.
    #[must_use]
    pub fn new(config: &ProviderCredentials, jwks: Arc<JwksCache>, http: reqwest::Client) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
            offline_access: config.offline_access,
            auth_url: endpoints::GOOGLE_AUTH_URL.to_owned(),
            token_url: endpoints::GOOGLE_TOKEN_URL.to_owned(),
            jwks_url: endpoints::GOOGLE_JWKS_URL.to_owned(),
            id_token_iss: endpoints::GOOGLE_ID_TOKEN_ISS.to_owned(),
            jwks,
            http,
        }
    }

    /// Validate a token-endpoint response and normalize the identity.
    ///
    /// This is the whole post-exchange protocol: bearer and scope
    /// checks, id_token signature validation via the JWKS cache, nonce
    /// comparison, and email verification.
    ///
    /// # Errors
    /// One of [`AuthError::Provider`], [`AuthError::Scope`],
    /// [`AuthError::Signature`], [`AuthError::Csrf`],
    /// [`AuthError::EmailNotVerified`], or [`AuthError::MissingInfo`].
    pub async fn process_token_response(
        &self,
        auth: TokenExchangeResponse,
        token: &StateToken,
    ) -> AuthResult<OAuthIdentity> {
        let access_token = require_bearer(&auth, Provider::Google)?;
        self.validate_scope(auth.scope.as_deref().unwrap_or_default())?;

        let Some(nonce) = token.nonce.as_deref() else {
            // Google state tokens are always minted with a nonce; a
            // missing one means the caller skipped StateToken::mint.
            return Err(AuthError::Validation(
                "google login state was minted without an OIDC nonce".into(),
            ));
        };

        let id_token = auth.id_token.as_deref().ok_or_else(|| {
            AuthError::Provider("google token response missing id_token".into())
        })?;

        let claims = self.validate_id_token(id_token).await?;

        if claims.nonce.as_deref() != Some(nonce) {
            warn!("google id_token nonce does not match login state");
            return Err(AuthError::Csrf);
        }

        if claims.email_verified != Some(true) {
            warn!("google account email is not verified");
            return Err(AuthError::EmailNotVerified(Provider::Google));
        }

        let sub = claims
            .sub
            .clone()
            .ok_or_else(|| AuthError::MissingInfo("google id_token missing sub".into()))?;
        let email = claims
            .email
            .clone()
            .ok_or_else(|| AuthError::MissingInfo("google id_token missing email".into()))?;

        Ok(OAuthIdentity {
            email,
            full_name: assemble_full_name(&claims),
            picture: claims.picture,
            provider: Provider::Google,
            provider_user_id: sub,
            provider_username: None,
            credentials: ProviderGrant {
                access_token: access_token.to_owned(),
                refresh_token: auth.refresh_token.clone(),
                id_token: auth.id_token.clone(),
                scope: auth.scope.clone().unwrap_or_default(),
                expires_in: auth.expires_in,
            },
        })
    }

    /// Verify the id_token signature against every cached JWKS key,
    /// accepting on the first key that validates.
    async fn validate_id_token(&self, id_token: &str) -> AuthResult<GoogleIdClaims> {
        let keys = self.jwks.get_keys(Provider::Google, &self.jwks_url).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.id_token_iss.as_str()]);
        validation.set_audience(&[self.client_id.as_str()]);

        for key in &keys.keys {
            let Ok(decoding_key) = key.decoding_key() else {
                continue;
            };
            match decode::<GoogleIdClaims>(id_token, &decoding_key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(err) => {
                    debug!(kid = key.kid.as_deref().unwrap_or("<no kid>"), %err, "JWKS key rejected id_token");
                }
            }
        }

        warn!(keys = keys.keys.len(), "id_token validation exhausted every JWKS key");
        Err(AuthError::Signature(
            "no google JWKS key validated the id_token".into(),
        ))
    }
}

#[async_trait]
impl IdentityProviderClient for GoogleClient {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn build_login_url(&self, token: &StateToken) -> String {
        let access_type = if self.offline_access { "offline" } else { "online" };
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("scope", self.scope.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("access_type", access_type),
            ("state", token.state.as_str()),
        ];
        // nonce is present when using OpenID Connect to get the id_token
        if let Some(nonce) = token.nonce.as_deref() {
            params.push(("nonce", nonce));
        }
        format!("{}?{}", self.auth_url, encode_query(&params))
    }

    // https://developers.google.com/identity/protocols/oauth2/scopes#openid_connect
    fn validate_scope(&self, granted_scope: &str) -> AuthResult<()> {
        let granted: Vec<&str> = granted_scope.split_whitespace().collect();
        let missing: Vec<&str> = self
            .scope
            .split_whitespace()
            .filter(|requested| !granted.contains(requested))
            .filter(|requested| match *requested {
                // Google reports the long-form userinfo scopes back in
                // their short aliases.
                "https://www.googleapis.com/auth/userinfo.email" => !granted.contains(&"email"),
                "https://www.googleapis.com/auth/userinfo.profile" => {
                    !granted.contains(&"profile")
                }
                _ => true,
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            let missing = missing.join(" ");
            warn!(%missing, "google grant is missing requested scope");
            Err(AuthError::Scope { missing })
        }
    }

    async fn exchange_code(&self, code: &str, token: &StateToken) -> AuthResult<OAuthIdentity> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("google token endpoint: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Provider(format!(
                "google token endpoint returned {status}"
            )));
        }

        let auth: TokenExchangeResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("google token response decode: {e}")))?;

        self.process_token_response(auth, token).await
    }
}

/// Prefer the `name` claim; otherwise assemble from given/family name.
fn assemble_full_name(claims: &GoogleIdClaims) -> Option<String> {
    if let Some(name) = &claims.name {
        return Some(name.clone());
    }
    let assembled = [claims.given_name.as_deref(), claims.family_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if assembled.is_empty() {
        None
    } else {
        Some(assembled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderCredentials;
    use crate::constants::scopes;

    fn client() -> GoogleClient {
        let config = ProviderCredentials {
            client_id: "cid.apps.googleusercontent.com".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:8080/auth".into(),
            scope: scopes::GOOGLE_LOGIN.to_owned(),
            offline_access: false,
        };
        GoogleClient::new(
            &config,
            Arc::new(JwksCache::new(reqwest::Client::new())),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn login_url_carries_state_and_nonce() {
        let client = client();
        let token = StateToken::mint(Provider::Google, None, true);
        let url = client.build_login_url(&token);

        assert!(url.starts_with(endpoints::GOOGLE_AUTH_URL));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("access_type=online"));
        assert!(url.contains(&format!("state={}", token.state)));
        assert!(url.contains(&format!("nonce={}", token.nonce.unwrap())));
    }

    #[test]
    fn short_scope_aliases_satisfy_long_form_grants() {
        let client = client();
        assert!(client.validate_scope("openid email profile").is_ok());
        assert!(client
            .validate_scope(
                "openid https://www.googleapis.com/auth/userinfo.email \
                 https://www.googleapis.com/auth/userinfo.profile"
            )
            .is_ok());
    }

    #[test]
    fn missing_scope_is_named() {
        let client = client();
        let err = client.validate_scope("openid email").unwrap_err();
        match err {
            AuthError::Scope { missing } => {
                assert_eq!(missing, "https://www.googleapis.com/auth/userinfo.profile");
            }
            other => panic!("expected Scope error, got {other:?}"),
        }
    }

    #[test]
    fn full_name_falls_back_to_given_and_family() {
        let claims = GoogleIdClaims {
            sub: Some("s".into()),
            email: Some("e".into()),
            email_verified: Some(true),
            name: None,
            given_name: Some("Test".into()),
            family_name: Some("User".into()),
            picture: None,
            nonce: None,
        };
        assert_eq!(assemble_full_name(&claims).as_deref(), Some("Test User"));
    }
}
