// ABOUTME: GitHub OAuth2 identity provider client
// ABOUTME: Login URL construction, code exchange, user and primary-email retrieval
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # GitHub OAuth2 Client
//!
//! GitHub publishes no JWKS; identity comes from the REST user and
//! emails endpoints called with the exchanged access token. The
//! primary email entry must exist, be non-empty, and be verified.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{encode_query, require_bearer, IdentityProviderClient, TokenExchangeResponse};
use crate::config::ProviderCredentials;
use crate::constants::{endpoints, scopes};
use crate::errors::{AuthError, AuthResult};
use crate::models::{OAuthIdentity, Provider, ProviderGrant};
use crate::state::StateToken;

/// Authenticated-user endpoint response.
#[derive(Debug, Deserialize)]
struct GithubUser {
    id: Option<i64>,
    login: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

/// One entry from the emails endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GithubEmail {
    pub(crate) email: Option<String>,
    #[serde(default)]
    pub(crate) primary: bool,
    #[serde(default)]
    pub(crate) verified: bool,
}

/// GitHub OAuth2 login/exchange client.
pub struct GithubClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scope: String,
    auth_url: String,
    token_url: String,
    user_url: String,
    emails_url: String,
    http: reqwest::Client,
}

impl GithubClient {
    /// Build a client from configured credentials.
    #[must_use]
    pub fn new(config: &ProviderCredentials, http: reqwest::Client) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
            auth_url: endpoints::GITHUB_AUTH_URL.to_owned(),
            token_url: endpoints::GITHUB_TOKEN_URL.to_owned(),
            user_url: endpoints::GITHUB_USER_URL.to_owned(),
            emails_url: endpoints::GITHUB_EMAILS_URL.to_owned(),
            http,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
        what: &str,
    ) -> AuthResult<T> {
        let response = self
            .http
            .get(url)
            .header("Authorization", format!("token {access_token}"))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "gatehouse")
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("github {what} endpoint: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Provider(format!(
                "github {what} endpoint returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("github {what} response decode: {e}")))
    }
}

/// Select the primary email entry and require it verified and
/// non-empty.
pub(crate) fn select_primary_email(emails: &[GithubEmail]) -> AuthResult<String> {
    let primary = emails.iter().find(|entry| entry.primary).ok_or_else(|| {
        warn!("github account has no primary email");
        AuthError::EmailNotVerified(Provider::Github)
    })?;

    let email = primary
        .email
        .as_deref()
        .filter(|address| !address.is_empty())
        .ok_or_else(|| AuthError::EmailNotVerified(Provider::Github))?;

    if !primary.verified {
        warn!("github primary email is not verified");
        return Err(AuthError::EmailNotVerified(Provider::Github));
    }

    Ok(email.to_owned())
}

#[async_trait]
impl IdentityProviderClient for GithubClient {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    fn build_login_url(&self, token: &StateToken) -> String {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", self.scope.as_str()),
            ("state", token.state.as_str()),
        ];
        format!("{}?{}", self.auth_url, encode_query(&params))
    }

    // https://docs.github.com/en/developers/apps/scopes-for-oauth-apps#normalized-scopes
    fn validate_scope(&self, granted_scope: &str) -> AuthResult<()> {
        let granted: Vec<&str> = granted_scope
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let missing: Vec<&str> = self
            .scope
            .split_whitespace()
            .filter(|requested| !granted.contains(requested))
            .filter(|requested| {
                // a granted `user` scope subsumes its sub-scopes
                !(scopes::GITHUB_USER_ALIASED.contains(requested) && granted.contains(&"user"))
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            let missing = missing.join(" ");
            warn!(%missing, "github grant is missing requested scope");
            Err(AuthError::Scope { missing })
        }
    }

    async fn exchange_code(&self, code: &str, token: &StateToken) -> AuthResult<OAuthIdentity> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("state", token.state.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("github token endpoint: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Provider(format!(
                "github token endpoint returned {status}"
            )));
        }

        let auth: TokenExchangeResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("github token response decode: {e}")))?;

        let access_token = require_bearer(&auth, Provider::Github)?.to_owned();
        self.validate_scope(auth.scope.as_deref().unwrap_or_default())?;

        let user: GithubUser = self.get_json(&self.user_url, &access_token, "user").await?;
        let emails: Vec<GithubEmail> = self
            .get_json(&self.emails_url, &access_token, "emails")
            .await?;
        let email = select_primary_email(&emails)?;

        let id = user
            .id
            .ok_or_else(|| AuthError::MissingInfo("github user missing id".into()))?;
        let login = user
            .login
            .ok_or_else(|| AuthError::MissingInfo("github user missing login".into()))?;

        Ok(OAuthIdentity {
            email,
            full_name: user.name,
            picture: user.avatar_url,
            provider: Provider::Github,
            provider_user_id: id.to_string(),
            provider_username: Some(login),
            credentials: ProviderGrant {
                access_token,
                refresh_token: auth.refresh_token.clone(),
                id_token: None,
                scope: auth.scope.clone().unwrap_or_default(),
                expires_in: auth.expires_in,
            },
        })
    }
}
