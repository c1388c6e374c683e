// ABOUTME: Service token claims, RS512 minting, and validation
// ABOUTME: Access, refresh, and exchange token types with per-type TTLs and response envelopes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # Service Tokens
//!
//! Gatehouse mints its own bearer tokens: access tokens for normal
//! sessions, refresh tokens to renew them, and short-lived exchange
//! tokens for stepping up to an admin-scoped session. All three carry
//! the same claim set (RFC 7519) with a `ttype` tag, signed RS512 with
//! the service private key. Validation checks the signature, requires
//! `exp`/`sub`/`iss`, matches the fixed issuer, and rejects expired
//! tokens with zero leeway; callers additionally assert the expected
//! `ttype` for the operation.

use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::constants::{service, token_expiry};
use crate::errors::TokenError;
use crate::models::{AdminRecord, User};

/// Token kinds this service mints, tagged into the `ttype` claim.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    /// Standard session token.
    #[serde(rename = "access_token")]
    Access,
    /// Long-lived token used to renew a session.
    #[serde(rename = "refresh_token")]
    Refresh,
    /// Short-lived elevated-privilege token for admin-scoped access.
    #[serde(rename = "exchange_token")]
    Exchange,
}

impl TokenType {
    /// Wire value of the `ttype` claim.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access_token",
            Self::Refresh => "refresh_token",
            Self::Exchange => "exchange_token",
        }
    }
}

impl Display for TokenType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Claim set minted into every service token (RFC 7519 registered
/// claims plus the custom `ttype` tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: user id for access/refresh, admin id for exchange.
    pub sub: String,
    /// Space-joined scope string.
    pub scope: String,
    /// Fixed service issuer.
    pub iss: String,
    /// Unique token id, minted for future revocation support.
    pub jti: String,
    /// Token type tag.
    pub ttype: TokenType,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

/// A freshly minted compact token with its claims.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// Compact `header.payload.signature` encoding.
    pub token: String,
    /// Seconds the caller may use the token, minus a safety margin;
    /// `None` for refresh tokens (clients are not told their horizon).
    pub expires_in: Option<i64>,
    /// The claims that were signed.
    pub claims: TokenClaims,
}

/// Bearer response envelope for a login or refresh.
#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    /// Compact access token.
    pub access_token: String,
    /// Always "Bearer".
    pub token_type: String,
    /// Seconds until the access token should be refreshed.
    pub expires_in: i64,
    /// Paired refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Subject user id, echoed for client convenience.
    pub userid: String,
    /// Display name from the authenticated identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Avatar URL from the authenticated identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// UI state supplied at the start of the login flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ustate: Option<String>,
}

/// Bearer response envelope for an admin step-up.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeToken {
    /// Compact exchange token.
    pub access_token: String,
    /// Always "Bearer".
    pub token_type: String,
    /// Seconds until the token lapses.
    pub expires_in: i64,
    /// Subject admin id.
    pub userid: String,
}

/// Mints and validates the service's own signed tokens.
pub struct TokenIssuer {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    exchange_ttl: Duration,
}

impl TokenIssuer {
    /// Build an issuer from JWT configuration.
    ///
    /// # Errors
    /// Fails when either PEM key is unusable or when the configured
    /// TTLs violate `TTL(access) < TTL(refresh)`.
    pub fn new(config: &JwtConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(
            config.access_ttl_minutes < config.refresh_ttl_minutes,
            "access token TTL ({} min) must be less than refresh token TTL ({} min)",
            config.access_ttl_minutes,
            config.refresh_ttl_minutes,
        );

        let encoding_key = EncodingKey::from_rsa_pem(config.private_key_pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("unusable RSA private key: {e}"))?;
        let decoding_key = DecodingKey::from_rsa_pem(config.public_key_pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("unusable RSA public key: {e}"))?;

        Ok(Self {
            issuer: config.issuer.clone(),
            encoding_key,
            decoding_key,
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: Duration::minutes(config.refresh_ttl_minutes),
            exchange_ttl: Duration::minutes(config.exchange_ttl_minutes),
        })
    }

    const fn ttl(&self, ttype: TokenType) -> Duration {
        match ttype {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
            TokenType::Exchange => self.exchange_ttl,
        }
    }

    /// Mint a signed token of the given type.
    ///
    /// # Errors
    /// Returns [`TokenError::Invalid`] if signing fails.
    pub fn issue(&self, sub: &str, scope: &str, ttype: TokenType) -> Result<SignedToken, TokenError> {
        let ttl = self.ttl(ttype);
        let claims = TokenClaims {
            sub: sub.to_owned(),
            scope: scope.to_owned(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().simple().to_string(),
            ttype,
            exp: (Utc::now() + ttl).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::RS512), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Invalid {
                reason: format!("token signing failed: {e}"),
            })?;

        let expires_in = match ttype {
            TokenType::Refresh => None,
            TokenType::Access | TokenType::Exchange => {
                Some(ttl.num_seconds() - token_expiry::EXPIRES_IN_MARGIN_SECS)
            }
        };

        Ok(SignedToken {
            token,
            expires_in,
            claims,
        })
    }

    /// Verify a compact token and return its claims.
    ///
    /// # Errors
    /// Returns a [`TokenError`] describing why the token was rejected.
    pub fn validate(&self, raw_token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::RS512);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<TokenClaims>(raw_token, &self.decoding_key, &validation)
            .map_err(|e| convert_jwt_error(&e))?;

        debug!(sub = %data.claims.sub, ttype = %data.claims.ttype, "validated bearer token");
        Ok(data.claims)
    }

    /// Verify a compact token and require a specific `ttype`.
    ///
    /// # Errors
    /// Returns [`TokenError::WrongType`] when the token verifies but
    /// was minted for a different purpose.
    pub fn validate_expected(
        &self,
        raw_token: &str,
        expected: TokenType,
    ) -> Result<TokenClaims, TokenError> {
        let claims = self.validate(raw_token)?;
        if claims.ttype != expected {
            return Err(TokenError::WrongType {
                expected,
                actual: claims.ttype,
            });
        }
        Ok(claims)
    }

    /// Mint the access/refresh pair for a user session.
    ///
    /// # Errors
    /// Returns [`TokenError::Invalid`] if signing fails.
    pub fn mint_session(
        &self,
        user: &User,
        ustate: Option<String>,
    ) -> Result<AccessToken, TokenError> {
        let subject = user.id.to_string();
        let access = self.issue(&subject, &user.scope, TokenType::Access)?;
        let refresh = self.issue(&subject, &user.scope, TokenType::Refresh)?;

        Ok(AccessToken {
            access_token: access.token,
            token_type: service::TOKEN_TYPE_BEARER.to_owned(),
            expires_in: access.expires_in.unwrap_or_default(),
            refresh_token: Some(refresh.token),
            userid: subject,
            full_name: user.full_name.clone(),
            picture: user.picture.clone(),
            ustate,
        })
    }

    /// Mint an exchange token carrying the admin's scope.
    ///
    /// # Errors
    /// Returns [`TokenError::Invalid`] if signing fails.
    pub fn mint_exchange(&self, admin: &AdminRecord) -> Result<ExchangeToken, TokenError> {
        let subject = admin.admin_id.to_string();
        let exchange = self.issue(&subject, &admin.scope, TokenType::Exchange)?;

        Ok(ExchangeToken {
            access_token: exchange.token,
            token_type: service::TOKEN_TYPE_BEARER.to_owned(),
            expires_in: exchange.expires_in.unwrap_or_default(),
            userid: subject,
        })
    }
}

fn convert_jwt_error(err: &jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidToken => TokenError::Malformed {
            details: "token format is invalid".into(),
        },
        ErrorKind::Base64(e) => TokenError::Malformed {
            details: format!("token contains invalid base64: {e}"),
        },
        ErrorKind::Json(e) => TokenError::Malformed {
            details: format!("token contains invalid JSON: {e}"),
        },
        ErrorKind::Utf8(e) => TokenError::Malformed {
            details: format!("token contains invalid UTF-8: {e}"),
        },
        _ => TokenError::Invalid {
            reason: err.to_string(),
        },
    }
}
