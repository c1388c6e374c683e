// ABOUTME: Main library entry point for the Gatehouse identity and credential core
// ABOUTME: Federated OIDC/OAuth2 login, signed bearer tokens, and API credential lifecycle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

#![deny(unsafe_code)]

//! # Gatehouse
//!
//! The identity and credential core of an account service. Gatehouse
//! federates login through external identity providers (Google OIDC,
//! GitHub OAuth2), mints and validates the service's own RS512-signed
//! bearer tokens, and manages the lifecycle of long-lived per-user API
//! credentials that those tokens authorize.
//!
//! The crate is a library: HTTP routing, relational schema management,
//! and the CLI administration surface are external collaborators. They
//! reach the core through [`manager::AccountManager`] and supply
//! persistence through the [`storage::Storage`] trait.
//!
//! ## Architecture
//!
//! - **`state`**: ephemeral, single-use CSRF/nonce state tokens
//! - **`jwks`**: per-provider cache of signature-verification keys
//! - **`oauth`**: provider clients (login URL, code exchange, identity
//!   normalization, scope validation)
//! - **`tokens`**: service token minting and validation
//! - **`credentials`**: API key/secret generation, hashing, state machine
//! - **`manager`**: the operations exposed to the routing layer
//!
//! ## Example
//!
//! ```rust,no_run
//! use gatehouse::config::ServiceConfig;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ServiceConfig::from_env()?;
//! println!("issuer: {}", config.jwt.issuer);
//! # Ok(())
//! # }
//! ```

/// Environment-driven service configuration
pub mod config;

/// Application constants: endpoints, scopes, TTLs, limits
pub mod constants;

/// API credential generation, hashing, and lifecycle state machine
pub mod credentials;

/// Unified error taxonomy for authentication and credential operations
pub mod errors;

/// Per-provider cache of JWKS signature-verification public keys
pub mod jwks;

/// Structured logging configuration
pub mod logging;

/// Exposed account operations: login flows, token exchange, credential management
pub mod manager;

/// Core data models: providers, users, identities, credentials
pub mod models;

/// Identity provider clients and the provider dispatch registry
pub mod oauth;

/// Single-use CSRF/nonce state tokens with TTL-bound storage
pub mod state;

/// Consumed persistence interface and the in-memory test backend
pub mod storage;

/// Service token claims, minting, and validation
pub mod tokens;
