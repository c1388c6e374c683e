// ABOUTME: Core data models for the Gatehouse identity core
// ABOUTME: Providers, users, normalized OAuth identities, admins, and API credentials
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # Data Models
//!
//! The record shapes shared across components. Provider-specific wire
//! formats live next to the clients in [`crate::oauth`]; everything here
//! is provider-agnostic. Secret material never appears in these models
//! in plaintext: credentials carry only a salted hash, and it is
//! excluded from serialization.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External identity providers this service can federate with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google, via OpenID Connect (id_token + published JWKS).
    Google,
    /// GitHub, via plain OAuth2 (user-info REST endpoints, no JWKS).
    Github,
}

impl Provider {
    /// Canonical lowercase name used in wire formats and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }

    /// Whether login state for this provider carries an OIDC nonce.
    #[must_use]
    pub const fn uses_oidc_nonce(self) -> bool {
        matches!(self, Self::Google)
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            other => Err(format!("unknown identity provider: {other}")),
        }
    }
}

/// Raw credentials granted by a provider during code exchange.
///
/// Carried inside [`OAuthIdentity`] for the caller to persist or
/// discard; never stored by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderGrant {
    /// Provider access token.
    pub access_token: String,
    /// Provider refresh token, when the provider issued one.
    pub refresh_token: Option<String>,
    /// Raw OIDC id_token, when the provider issued one.
    pub id_token: Option<String>,
    /// Scope string exactly as the provider granted it.
    pub scope: String,
    /// Seconds until the provider access token expires.
    pub expires_in: Option<i64>,
}

/// Normalized result of a successful authorization-code exchange.
///
/// Uniform shape regardless of provider. An exchange either fully
/// succeeds with one of these or fails with a specific error kind;
/// no partial identity is ever produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthIdentity {
    /// Verified email address reported by the provider.
    pub email: String,
    /// Display name, when the provider supplied one.
    pub full_name: Option<String>,
    /// Avatar/profile picture URL.
    pub picture: Option<String>,
    /// Provider that authenticated this identity.
    pub provider: Provider,
    /// The provider's stable identifier for the account.
    pub provider_user_id: String,
    /// Provider-side username (GitHub login); absent for Google.
    pub provider_username: Option<String>,
    /// Raw provider credentials from the exchange.
    pub credentials: ProviderGrant,
}

/// A user account record, persisted by the external storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable account identifier.
    pub id: Uuid,
    /// Account email, unique across users.
    pub email: String,
    /// Display name from the most recent login.
    pub full_name: Option<String>,
    /// Avatar URL from the most recent login.
    pub picture: Option<String>,
    /// Provider the account was created through.
    pub provider: Provider,
    /// The provider's identifier for the account.
    pub provider_user_id: String,
    /// Space-joined scope minted into this user's tokens.
    pub scope: String,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
}

/// An administrator record, persisted by the external storage layer.
///
/// Admins are looked up by (user email, admin username); the password
/// hash uses the same bcrypt primitive as API credential secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRecord {
    /// Stable admin identifier, the subject of exchange tokens.
    pub admin_id: Uuid,
    /// Email shared with the admin's user account.
    pub email: String,
    /// Admin login name.
    pub username: String,
    /// Salted bcrypt hash of the admin password.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Space-joined scope minted into exchange tokens.
    pub scope: String,
}

/// A long-lived API credential owned by a user.
///
/// Lifecycle states: enabled, disabled (owner-reversible), frozen
/// (admin-imposed, owner cannot clear), deleted (terminal). A deleted
/// credential is excluded from every subsequent read and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCredential {
    /// Generated identifier, immutable for the credential's lifetime.
    pub id: Uuid,
    /// Owning user.
    pub owner_user_id: Uuid,
    /// Salted bcrypt hash of the secret. The plaintext is returned to
    /// the owner exactly once at generation and never stored.
    #[serde(skip_serializing)]
    pub secret_hash: String,
    /// Admin-imposed freeze; blocks all owner mutations.
    pub frozen: bool,
    /// Owner-imposed, reversible disable.
    pub disabled: bool,
    /// Terminal deletion marker.
    pub deleted: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Optional owner-supplied description.
    pub description: Option<String>,
}

impl ApiCredential {
    /// Build a new enabled credential with a fresh id.
    #[must_use]
    pub fn new(owner_user_id: Uuid, secret_hash: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_user_id,
            secret_hash,
            frozen: false,
            disabled: false,
            deleted: false,
            created_at: now,
            updated_at: now,
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_round_trips_through_str() {
        for provider in [Provider::Google, Provider::Github] {
            let parsed: Provider = provider.as_str().parse().unwrap();
            assert_eq!(parsed, provider);
        }
        assert!("gitlab".parse::<Provider>().is_err());
    }

    #[test]
    fn credential_serialization_omits_secret_hash() {
        let credential = ApiCredential::new(Uuid::new_v4(), "hash".into(), None);
        let json = serde_json::to_value(&credential).unwrap();
        assert!(json.get("secret_hash").is_none());
        assert_eq!(json["disabled"], false);
    }
}
