// ABOUTME: API credential secret generation, hashing, and lifecycle state machine
// ABOUTME: Owner mutations ride the storage layer's conditional update so admin freezes always win
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # API Credentials
//!
//! Long-lived key/secret pairs issued to users for programmatic API
//! access, distinct from login session tokens. The plaintext secret is
//! returned to the owner exactly once at generation; only a salted
//! bcrypt hash is ever persisted.
//!
//! Lifecycle states: enabled, disabled (owner-reversible), frozen
//! (admin-imposed), deleted (terminal). Every owner mutation checks
//! `frozen` first, and the storage layer re-checks it inside the
//! conditional update, so a concurrent admin freeze can never be
//! silently overridden by an owner toggle.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::{thread_rng, RngCore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::constants::limits;
use crate::errors::{AuthError, AuthResult, CredentialError};
use crate::models::ApiCredential;
use crate::storage::{CredentialMutation, CredentialUpdateOutcome, Storage, StorageError};

/// A freshly generated secret: the plaintext to hand to the owner and
/// the hash to persist.
#[derive(Debug)]
pub struct GeneratedSecret {
    /// Returned to the caller exactly once, never stored.
    pub plaintext: String,
    /// Salted bcrypt hash for persistence.
    pub hash: String,
}

/// Generate a credential secret and its storage hash.
///
/// 48 bytes of randomness base64url-encode to a 64-character secret,
/// which stays under bcrypt's 72-byte input truncation limit.
///
/// # Errors
/// Returns [`AuthError::Internal`] if the hashing primitive fails.
pub fn generate_secret() -> AuthResult<GeneratedSecret> {
    let mut entropy = [0u8; limits::SECRET_ENTROPY_BYTES];
    thread_rng().fill_bytes(&mut entropy);
    let plaintext = URL_SAFE_NO_PAD.encode(entropy);
    let hash = hash_secret(&plaintext)?;
    Ok(GeneratedSecret { plaintext, hash })
}

/// Salted bcrypt hash of a secret or password.
///
/// # Errors
/// Returns [`AuthError::Internal`] if the hashing primitive fails.
pub fn hash_secret(plaintext: &str) -> AuthResult<String> {
    bcrypt::hash(plaintext, bcrypt::DEFAULT_COST)
        .map_err(|e| AuthError::Internal(format!("secret hashing failed: {e}")))
}

/// Verify a plaintext secret against a stored hash using the hashing
/// primitive's own constant-time compare. An unparseable hash verifies
/// as `false` rather than erroring.
#[must_use]
pub fn verify_secret(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or_else(|e| {
        warn!("stored secret hash could not be parsed: {e}");
        false
    })
}

/// Result of a toggle request.
#[derive(Debug)]
pub struct ToggleResult {
    /// The credential after the operation.
    pub credential: ApiCredential,
    /// `false` when the credential was already in the target state
    /// (a no-op success, no mutation performed).
    pub changed: bool,
}

/// Owner-facing credential lifecycle operations.
pub struct CredentialManager<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> CredentialManager<S> {
    /// Create a manager over the given storage backend.
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Create a credential in the enabled state, returning the record
    /// and the plaintext secret (the only time it is visible).
    ///
    /// # Errors
    /// [`AuthError::Validation`] for an oversized description;
    /// [`AuthError::Internal`] when id generation keeps colliding.
    pub async fn create(
        &self,
        owner: Uuid,
        description: Option<String>,
    ) -> AuthResult<(ApiCredential, String)> {
        if let Some(text) = &description {
            if text.len() > limits::CREDENTIAL_DESCRIPTION_MAX {
                return Err(AuthError::Validation(format!(
                    "description exceeds {} characters",
                    limits::CREDENTIAL_DESCRIPTION_MAX
                )));
            }
        }

        let secret = generate_secret()?;

        for attempt in 0..limits::CREDENTIAL_ID_RETRIES {
            let credential = ApiCredential::new(owner, secret.hash.clone(), description.clone());
            match self.storage.insert_credential(&credential).await {
                Ok(()) => {
                    info!(owner = %owner, credential = %credential.id, "created api credential");
                    return Ok((credential, secret.plaintext));
                }
                Err(StorageError::IdCollision) => {
                    warn!(attempt, "credential id collided, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AuthError::Internal(
            "credential id generation kept colliding".into(),
        ))
    }

    /// Live (non-deleted) credentials owned by `owner`.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub async fn list(&self, owner: Uuid) -> AuthResult<Vec<ApiCredential>> {
        Ok(self.storage.list_credentials(owner).await?)
    }

    /// Set the owner-reversible disabled flag.
    ///
    /// Toggling to the current state is a no-op success. A frozen
    /// credential is rejected regardless of the requested target.
    ///
    /// # Errors
    /// [`CredentialError::Frozen`], [`CredentialError::NotFound`], or
    /// [`CredentialError::Unknown`] when the post-update state does
    /// not match the request.
    pub async fn toggle(&self, owner: Uuid, id: Uuid, disabled: bool) -> AuthResult<ToggleResult> {
        let current = self
            .storage
            .get_credential(owner, id)
            .await?
            .ok_or(CredentialError::NotFound)?;

        if current.frozen {
            warn!(owner = %owner, credential = %id, "toggle rejected: credential is frozen");
            return Err(CredentialError::Frozen.into());
        }
        if current.disabled == disabled {
            return Ok(ToggleResult {
                credential: current,
                changed: false,
            });
        }

        let outcome = self
            .storage
            .conditional_update_credential(owner, id, CredentialMutation::SetDisabled(disabled))
            .await?;

        match outcome {
            CredentialUpdateOutcome::Updated(credential) => {
                if credential.disabled == disabled {
                    info!(owner = %owner, credential = %id, disabled, "toggled api credential");
                    Ok(ToggleResult {
                        credential,
                        changed: true,
                    })
                } else {
                    error!(owner = %owner, credential = %id, "toggle returned an unexpected state");
                    Err(CredentialError::Unknown.into())
                }
            }
            CredentialUpdateOutcome::Frozen => Err(CredentialError::Frozen.into()),
            CredentialUpdateOutcome::NotFound => Err(CredentialError::NotFound.into()),
        }
    }

    /// Replace the credential secret, invalidating the previous one.
    /// Returns the new plaintext, visible exactly once.
    ///
    /// # Errors
    /// [`CredentialError::Frozen`] or [`CredentialError::NotFound`].
    pub async fn rotate_secret(&self, owner: Uuid, id: Uuid) -> AuthResult<String> {
        let secret = generate_secret()?;

        let outcome = self
            .storage
            .conditional_update_credential(owner, id, CredentialMutation::SetSecretHash(secret.hash))
            .await?;

        match outcome {
            CredentialUpdateOutcome::Updated(_) => {
                info!(owner = %owner, credential = %id, "rotated api credential secret");
                Ok(secret.plaintext)
            }
            CredentialUpdateOutcome::Frozen => {
                warn!(owner = %owner, credential = %id, "rotate rejected: credential is frozen");
                Err(CredentialError::Frozen.into())
            }
            CredentialUpdateOutcome::NotFound => Err(CredentialError::NotFound.into()),
        }
    }

    /// Mark the credential deleted. Terminal: the credential vanishes
    /// from every subsequent read, so a second delete reports
    /// `NotFound` rather than succeeding idempotently.
    ///
    /// # Errors
    /// [`CredentialError::Frozen`], [`CredentialError::NotFound`], or
    /// [`CredentialError::Unknown`].
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> AuthResult<()> {
        let outcome = self
            .storage
            .conditional_update_credential(owner, id, CredentialMutation::SetDeleted)
            .await?;

        match outcome {
            CredentialUpdateOutcome::Updated(credential) => {
                if credential.deleted {
                    info!(owner = %owner, credential = %id, "deleted api credential");
                    Ok(())
                } else {
                    error!(owner = %owner, credential = %id, "delete returned an unexpected state");
                    Err(CredentialError::Unknown.into())
                }
            }
            CredentialUpdateOutcome::Frozen => {
                warn!(owner = %owner, credential = %id, "delete rejected: credential is frozen");
                Err(CredentialError::Frozen.into())
            }
            CredentialUpdateOutcome::NotFound => Err(CredentialError::NotFound.into()),
        }
    }
}
