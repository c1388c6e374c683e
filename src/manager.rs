// ABOUTME: AccountManager, the operations the routing layer exposes as endpoints
// ABOUTME: Login flows, session refresh, admin step-up, and bearer-guarded credential management
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # Account Manager
//!
//! One [`AccountManager`] is constructed at process start with every
//! component it composes — provider registry, state store, token
//! issuer, storage — and passed by reference into request-handling
//! code. There is no module-level state.
//!
//! Control flow for federated login: `begin_login` mints and stores a
//! state token and returns the provider authorization URL; on
//! callback, `complete_login` atomically pops the state, exchanges the
//! code, finds or creates the user, and mints the session pair. A
//! popped state token is final even when the exchange that follows
//! fails — replaying the same `state` is always rejected.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::constants::service;
use crate::credentials::{verify_secret, CredentialManager, ToggleResult};
use crate::errors::{AuthError, AuthResult};
use crate::models::{ApiCredential, Provider};
use crate::oauth::ProviderRegistry;
use crate::state::{StateToken, StateTokenStore};
use crate::storage::Storage;
use crate::tokens::{AccessToken, ExchangeToken, TokenIssuer, TokenType};

/// Redirect target for a freshly started login attempt.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    /// Provider authorization URL the caller should redirect to.
    pub authorization_url: String,
    /// The `state` value bound to this attempt, echoed for clients
    /// that track pending logins.
    pub state: String,
}

/// The exposed operations of the identity/credential core.
pub struct AccountManager<S: Storage> {
    registry: ProviderRegistry,
    state_store: StateTokenStore,
    issuer: TokenIssuer,
    storage: Arc<S>,
    credentials: CredentialManager<S>,
}

impl<S: Storage> AccountManager<S> {
    /// Compose a manager from its injected components.
    #[must_use]
    pub fn new(
        registry: ProviderRegistry,
        state_store: StateTokenStore,
        issuer: TokenIssuer,
        storage: Arc<S>,
    ) -> Self {
        let credentials = CredentialManager::new(Arc::clone(&storage));
        Self {
            registry,
            state_store,
            issuer,
            storage,
            credentials,
        }
    }

    // ================================
    // Federated login
    // ================================

    /// Start a login attempt: mint and store a state token, then
    /// build the provider authorization URL.
    ///
    /// # Errors
    /// [`AuthError::UnsupportedProvider`] when no client is registered
    /// for `provider`.
    pub async fn begin_login(
        &self,
        provider: Provider,
        ui_state: Option<String>,
    ) -> AuthResult<LoginRedirect> {
        let client = self
            .registry
            .get(provider)
            .ok_or_else(|| AuthError::UnsupportedProvider(provider.to_string()))?;

        let token = StateToken::mint(provider, ui_state, provider.uses_oidc_nonce());
        let authorization_url = client.build_login_url(&token);
        let state = token.state.clone();
        self.state_store.store(token).await;

        info!(provider = %provider, "login redirect issued");
        Ok(LoginRedirect {
            authorization_url,
            state,
        })
    }

    /// Complete a login from the provider callback.
    ///
    /// The state token is consumed before anything else; a failed
    /// exchange does not refund it.
    ///
    /// # Errors
    /// [`AuthError::Csrf`] when the state is unknown, expired, or
    /// replayed; otherwise whatever the provider exchange surfaces.
    pub async fn complete_login(&self, code: &str, state: &str) -> AuthResult<AccessToken> {
        let token = self.state_store.pop_and_verify(state).await.ok_or_else(|| {
            warn!("login callback presented an unknown or consumed state");
            AuthError::Csrf
        })?;

        let client = self
            .registry
            .get(token.provider)
            .ok_or_else(|| AuthError::UnsupportedProvider(token.provider.to_string()))?;

        let identity = client.exchange_code(code, &token).await?;

        let user = match self.storage.get_user_by_email(&identity.email).await? {
            Some(existing) => {
                self.storage
                    .update_user_identity(existing.id, &identity)
                    .await?
            }
            None => {
                let user = self
                    .storage
                    .create_user(&identity, service::DEFAULT_USER_SCOPE)
                    .await?;
                info!(user = %user.id, provider = %identity.provider, "created account from federated login");
                user
            }
        };

        info!(user = %user.id, provider = %identity.provider, "login completed");
        Ok(self.issuer.mint_session(&user, token.ui_state.clone())?)
    }

    /// Renew a session from a refresh token.
    ///
    /// # Errors
    /// [`AuthError::Token`] for an invalid/expired/wrong-type token;
    /// [`AuthError::Unauthenticated`] when the subject no longer
    /// resolves to an account.
    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AccessToken> {
        let claims = self
            .issuer
            .validate_expected(refresh_token, TokenType::Refresh)?;

        let user_id = parse_subject(&claims.sub)?;
        let user = self
            .storage
            .get_user(user_id)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        info!(user = %user.id, "session refreshed");
        Ok(self.issuer.mint_session(&user, None)?)
    }

    // ================================
    // Admin step-up
    // ================================

    /// Trade a valid access token plus admin credentials for a
    /// short-lived exchange token.
    ///
    /// Every failure after token validation collapses into
    /// [`AuthError::Unauthenticated`] so callers cannot probe which
    /// check failed.
    ///
    /// # Errors
    /// [`AuthError::Unauthenticated`] on any rejection.
    pub async fn issue_exchange_token(
        &self,
        bearer: &str,
        admin_username: &str,
        admin_password: &str,
    ) -> AuthResult<ExchangeToken> {
        // The bearer must be an access token, not a refresh or
        // exchange token.
        let claims = self
            .issuer
            .validate_expected(bearer, TokenType::Access)
            .map_err(|err| {
                warn!(%err, "exchange token request with unusable bearer");
                AuthError::Unauthenticated
            })?;

        let user_id = parse_subject(&claims.sub).map_err(|_| AuthError::Unauthenticated)?;
        let user = self
            .storage
            .get_user(user_id)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        let admin = self
            .storage
            .get_admin(&user.email, admin_username)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        if !verify_secret(admin_password, &admin.password_hash) {
            warn!(admin = %admin.admin_id, "exchange token request with wrong password");
            return Err(AuthError::Unauthenticated);
        }

        info!(admin = %admin.admin_id, "exchange token issued");
        Ok(self.issuer.mint_exchange(&admin)?)
    }

    // ================================
    // API credentials
    // ================================

    /// Create a credential for the bearer's account. Returns the
    /// record and the plaintext secret, visible exactly once.
    ///
    /// # Errors
    /// [`AuthError::Unauthenticated`] for an unusable bearer;
    /// otherwise whatever [`CredentialManager::create`] surfaces.
    pub async fn create_credential(
        &self,
        bearer: &str,
        description: Option<String>,
    ) -> AuthResult<(ApiCredential, String)> {
        let owner = self.authenticate_owner(bearer)?;
        self.credentials.create(owner, description).await
    }

    /// Live credentials owned by the bearer's account.
    ///
    /// # Errors
    /// [`AuthError::Unauthenticated`] for an unusable bearer.
    pub async fn list_credentials(&self, bearer: &str) -> AuthResult<Vec<ApiCredential>> {
        let owner = self.authenticate_owner(bearer)?;
        self.credentials.list(owner).await
    }

    /// Disable a credential (owner-reversible).
    ///
    /// # Errors
    /// [`AuthError::Credential`] per the state machine.
    pub async fn disable_credential(&self, bearer: &str, id: Uuid) -> AuthResult<ToggleResult> {
        let owner = self.authenticate_owner(bearer)?;
        self.credentials.toggle(owner, id, true).await
    }

    /// Re-enable a disabled credential.
    ///
    /// # Errors
    /// [`AuthError::Credential`] per the state machine.
    pub async fn enable_credential(&self, bearer: &str, id: Uuid) -> AuthResult<ToggleResult> {
        let owner = self.authenticate_owner(bearer)?;
        self.credentials.toggle(owner, id, false).await
    }

    /// Rotate a credential secret, invalidating the previous one.
    /// Returns the new plaintext, visible exactly once.
    ///
    /// # Errors
    /// [`AuthError::Credential`] per the state machine.
    pub async fn rotate_credential(&self, bearer: &str, id: Uuid) -> AuthResult<String> {
        let owner = self.authenticate_owner(bearer)?;
        self.credentials.rotate_secret(owner, id).await
    }

    /// Delete a credential (terminal).
    ///
    /// # Errors
    /// [`AuthError::Credential`] per the state machine; a second
    /// delete reports `NotFound`.
    pub async fn delete_credential(&self, bearer: &str, id: Uuid) -> AuthResult<()> {
        let owner = self.authenticate_owner(bearer)?;
        self.credentials.delete(owner, id).await
    }

    /// Validate the bearer as an access token and resolve its subject
    /// to the owner id.
    fn authenticate_owner(&self, bearer: &str) -> AuthResult<Uuid> {
        let claims = self
            .issuer
            .validate_expected(bearer, TokenType::Access)
            .map_err(|err| {
                warn!(%err, "credential operation with unusable bearer");
                AuthError::Unauthenticated
            })?;
        parse_subject(&claims.sub).map_err(|_| AuthError::Unauthenticated)
    }
}

fn parse_subject(sub: &str) -> AuthResult<Uuid> {
    Uuid::parse_str(sub)
        .map_err(|_| AuthError::Validation(format!("token subject {sub:?} is not a valid id")))
}
