// ABOUTME: Unified error taxonomy for authentication, token, and credential operations
// ABOUTME: Every operation fails with a specific kind; nothing is downgraded to a default identity
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # Error Taxonomy
//!
//! Each component operation surfaces a specific error kind rather than a
//! generic failure. Provider and network errors are never retried here;
//! retry policy, if any, belongs to the HTTP client wrapper outside this
//! crate. Signature validation fails closed: there is no fallback to an
//! unverified token.

use thiserror::Error;

use crate::models::Provider;
use crate::storage::StorageError;
use crate::tokens::TokenType;

/// Convenience alias for results carrying [`AuthError`].
pub type AuthResult<T> = Result<T, AuthError>;

/// Top-level error type for the identity/credential core.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No client is registered for the requested provider.
    #[error("identity provider not supported: {0}")]
    UnsupportedProvider(String),

    /// State token missing, expired, replayed, or nonce mismatch.
    #[error("state token missing, expired, or already used")]
    Csrf,

    /// The provider granted less scope than was requested.
    #[error("missing required scope: {missing}")]
    Scope {
        /// Space-joined list of the scopes the grant is missing.
        missing: String,
    },

    /// The provider account's email address is not verified.
    #[error("{0} account email is not verified")]
    EmailNotVerified(Provider),

    /// The provider omitted a field the identity cannot be built without.
    #[error("identity provider omitted mandatory field: {0}")]
    MissingInfo(String),

    /// Network failure, non-2xx status, or malformed provider response.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// The provider's key endpoint failed and no cached keys exist.
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// No published key validated the provider-signed token.
    #[error("signature verification failed: {0}")]
    Signature(String),

    /// Service token validation failure.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Credential state-machine rejection.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Malformed caller input.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Uniform rejection for authenticated operations. Deliberately
    /// carries no detail so callers cannot distinguish a missing account
    /// from a bad password.
    #[error("not authenticated")]
    Unauthenticated,

    /// Unexpected internal failure (RNG, hashing primitive, etc).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Service token validation errors with enough detail to audit.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Token `exp` is in the past.
    #[error("token has expired")]
    Expired,

    /// Signature or claim verification failed.
    #[error("token is invalid: {reason}")]
    Invalid {
        /// Reason for invalidity.
        reason: String,
    },

    /// Not a parseable three-part compact token.
    #[error("token is malformed: {details}")]
    Malformed {
        /// Details about the malformation.
        details: String,
    },

    /// The token verified but carries the wrong `ttype` for the operation.
    #[error("expected a {expected} token, got a {actual} token")]
    WrongType {
        /// Token type the operation requires.
        expected: TokenType,
        /// Token type that was presented.
        actual: TokenType,
    },
}

/// Credential state-machine errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// Frozen by an administrator; owner mutations are rejected
    /// regardless of the requested target state.
    #[error("credential is frozen by an administrator")]
    Frozen,

    /// No live credential matches; deleted credentials are excluded
    /// from every lookup.
    #[error("credential not found")]
    NotFound,

    /// A conditional update returned a state other than the one
    /// requested. Unreachable under correct transaction isolation,
    /// but handled rather than assumed away.
    #[error("credential state could not be confirmed")]
    Unknown,
}
