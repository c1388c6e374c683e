// ABOUTME: System-wide constants for the Gatehouse identity core
// ABOUTME: Provider endpoints, login scopes, token TTLs, and entropy/size limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # Constants Module
//!
//! Hardcoded values that define the service's behavior: provider
//! endpoints, default login scopes, token lifetimes, and the entropy
//! and size limits of generated material. Anything an operator may
//! reasonably override lives in [`crate::config`] instead.

/// Service identity
pub mod service {
    /// Fixed `iss` claim on every token this service mints.
    pub const TOKEN_ISSUER: &str = "https://gatehouse.dev";

    /// Bearer scheme label used in token response envelopes.
    pub const TOKEN_TYPE_BEARER: &str = "Bearer";

    /// Scope granted to accounts created through federated login.
    pub const DEFAULT_USER_SCOPE: &str = "gatehouse:user";
}

/// Identity provider endpoints
///
/// Google values come from
/// <https://accounts.google.com/.well-known/openid-configuration>.
pub mod endpoints {
    /// Google authorization endpoint.
    pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
    /// Google token endpoint.
    pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
    /// Google published JWKS endpoint.
    pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
    /// `iss` claim Google places in its id_tokens.
    pub const GOOGLE_ID_TOKEN_ISS: &str = "https://accounts.google.com";

    /// GitHub authorization endpoint.
    pub const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
    /// GitHub token endpoint.
    pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
    /// GitHub authenticated-user endpoint.
    pub const GITHUB_USER_URL: &str = "https://api.github.com/user";
    /// GitHub user emails endpoint.
    pub const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";
}

/// Default login scopes requested from each provider
pub mod scopes {
    /// Google OIDC login scope.
    pub const GOOGLE_LOGIN: &str = "openid https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/userinfo.profile";

    /// GitHub login scope.
    pub const GITHUB_LOGIN: &str = "read:user user:email";

    /// GitHub scopes subsumed by a granted `user` scope.
    /// <https://docs.github.com/en/developers/apps/scopes-for-oauth-apps#normalized-scopes>
    pub const GITHUB_USER_ALIASED: &[&str] = &["read:user", "user:email", "user:follow"];
}

/// Entropy and size limits
pub mod limits {
    /// Length in characters of a generated `state`/`nonce` value.
    pub const STATE_TOKEN_CHARS: usize = 48;

    /// Minimum count of lowercase, uppercase, and digit characters a
    /// generated state token must contain (shape check, re-sampled
    /// until satisfied).
    pub const STATE_TOKEN_MIN_CLASS: usize = 3;

    /// Lifetime of a stored state token.
    pub const STATE_TOKEN_TTL_MINUTES: i64 = 8;

    /// Entropy bytes behind a generated credential secret. 48 bytes
    /// base64url-encode to 64 characters, under bcrypt's 72-byte
    /// input truncation limit.
    pub const SECRET_ENTROPY_BYTES: usize = 48;

    /// Maximum length of a credential description.
    pub const CREDENTIAL_DESCRIPTION_MAX: usize = 255;

    /// Bounded retries when a generated credential id collides.
    pub const CREDENTIAL_ID_RETRIES: usize = 3;

    /// Seconds a fetched JWKS key set is served before refresh.
    pub const JWKS_REFRESH_SECONDS: i64 = 3600;
}

/// Token lifetimes
pub mod token_expiry {
    /// Access token TTL. Must stay below the refresh token TTL.
    pub const ACCESS_TTL_MINUTES: i64 = 60;

    /// Refresh token TTL.
    pub const REFRESH_TTL_MINUTES: i64 = 8 * 60;

    /// Exchange (elevated-privilege) token TTL.
    pub const EXCHANGE_TTL_MINUTES: i64 = 60;

    /// Margin subtracted from the TTL when reporting `expires_in`, so
    /// clients refresh slightly before the token actually lapses.
    pub const EXPIRES_IN_MARGIN_SECS: i64 = 10;
}
