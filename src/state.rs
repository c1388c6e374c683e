// ABOUTME: Single-use CSRF/nonce state tokens for login flows
// ABOUTME: TTL-bound in-process store with atomic pop-and-verify replay prevention
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # Login State Tokens
//!
//! A state token is minted when a login redirect is requested and
//! consumed exactly once when the provider calls back. `state` protects
//! the end user from cross-site request forgery (RFC 6749 §10.12);
//! `nonce` binds an OIDC id_token to the original authorization request
//! and prevents replay.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use tokio::sync::RwLock;

use crate::constants::limits;
use crate::models::Provider;

/// A single login attempt's CSRF/replay binding.
#[derive(Debug, Clone)]
pub struct StateToken {
    /// Random CSRF handle, the storage key. Consumed at most once.
    pub state: String,
    /// OIDC replay binding, present for providers that return id_tokens.
    pub nonce: Option<String>,
    /// Opaque client-supplied UI state returned after login.
    pub ui_state: Option<String>,
    /// Provider this login attempt targets.
    pub provider: Provider,
    /// Mint time; the token expires `STATE_TOKEN_TTL_MINUTES` later.
    pub issued_at: DateTime<Utc>,
}

impl StateToken {
    /// Mint a fresh state token for a login attempt.
    #[must_use]
    pub fn mint(provider: Provider, ui_state: Option<String>, with_nonce: bool) -> Self {
        Self {
            state: gen_state(),
            nonce: with_nonce.then(gen_state),
            ui_state,
            provider,
            issued_at: Utc::now(),
        }
    }
}

/// Generate a random alphanumeric token of `STATE_TOKEN_CHARS`
/// characters, re-sampled until it contains at least
/// `STATE_TOKEN_MIN_CLASS` lowercase, uppercase, and digit characters.
///
/// The shape check is defense-in-depth on top of the RNG, not a
/// security requirement in itself.
#[must_use]
pub fn gen_state() -> String {
    loop {
        let candidate: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(limits::STATE_TOKEN_CHARS)
            .map(char::from)
            .collect();

        let lower = candidate.chars().filter(char::is_ascii_lowercase).count();
        let upper = candidate.chars().filter(char::is_ascii_uppercase).count();
        let digits = candidate.chars().filter(char::is_ascii_digit).count();

        if lower >= limits::STATE_TOKEN_MIN_CLASS
            && upper >= limits::STATE_TOKEN_MIN_CLASS
            && digits >= limits::STATE_TOKEN_MIN_CLASS
        {
            return candidate;
        }
    }
}

/// TTL-bound store of pending state tokens, keyed by `state`.
///
/// Safe under concurrent access: `pop_and_verify` removes the entry
/// under a single write-lock critical section, so two callers racing
/// on the same `state` cannot both succeed. A successful pop is final
/// even if the caller is later cancelled; the token is not refunded.
pub struct StateTokenStore {
    ttl: Duration,
    tokens: RwLock<HashMap<String, StateToken>>,
}

impl StateTokenStore {
    /// Create a store with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(limits::STATE_TOKEN_TTL_MINUTES))
    }

    /// Create a store with an explicit TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Persist a pending token, keyed by its `state` value.
    ///
    /// Expired entries are swept opportunistically on each store so an
    /// abandoned login flow cannot grow the map without bound.
    pub async fn store(&self, token: StateToken) {
        let deadline = Utc::now() - self.ttl;
        let mut tokens = self.tokens.write().await;
        tokens.retain(|_, pending| pending.issued_at > deadline);
        tokens.insert(token.state.clone(), token);
    }

    /// Atomically remove and return the token stored under `state`.
    ///
    /// Returns `None` when the state is unknown, already consumed, or
    /// past its TTL; an expired entry is removed but treated exactly
    /// like a missing one.
    pub async fn pop_and_verify(&self, state: &str) -> Option<StateToken> {
        let token = self.tokens.write().await.remove(state)?;
        if Utc::now() - token.issued_at > self.ttl {
            tracing::warn!(provider = %token.provider, "expired state token presented");
            return None;
        }
        Some(token)
    }

    /// Number of pending tokens, expired entries included.
    pub async fn pending(&self) -> usize {
        self.tokens.read().await.len()
    }
}

impl Default for StateTokenStore {
    fn default() -> Self {
        Self::new()
    }
}
