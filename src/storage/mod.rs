// ABOUTME: Consumed persistence interface for users, admins, and API credentials
// ABOUTME: Conditional credential updates carry the freeze/delete checks into the storage transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # Storage Interface
//!
//! Persistence is an external collaborator: schema definition and
//! migrations live outside this crate, and implementations of
//! [`Storage`] adapt whatever backend the deployment uses. The one
//! correctness obligation pushed into implementations is transaction
//! isolation for [`Storage::conditional_update_credential`] — the
//! existence/frozen/deleted checks and the mutation must be a single
//! atomic unit, so a racing admin freeze always wins over an owner
//! mutation.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AdminRecord, ApiCredential, OAuthIdentity, User};

/// Persistence layer failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A generated identifier collided with an existing record.
    #[error("record identifier already exists")]
    IdCollision,

    /// Backend failure (connection, query, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A single mutation applied through the conditional update path.
#[derive(Debug, Clone)]
pub enum CredentialMutation {
    /// Set the owner-reversible disabled flag.
    SetDisabled(bool),
    /// Replace the secret hash, invalidating the previous secret.
    SetSecretHash(String),
    /// Mark the credential deleted (terminal).
    SetDeleted,
}

/// Outcome of a conditional credential update.
#[derive(Debug)]
pub enum CredentialUpdateOutcome {
    /// The mutation was applied; carries the post-update row.
    Updated(ApiCredential),
    /// The row exists but is frozen; nothing was mutated.
    Frozen,
    /// No live row matches (missing or already deleted).
    NotFound,
}

/// The persistence operations this crate consumes.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// User by id.
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StorageError>;

    /// User by email address.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    /// Create a user record from a freshly authenticated identity.
    async fn create_user(
        &self,
        identity: &OAuthIdentity,
        scope: &str,
    ) -> Result<User, StorageError>;

    /// Refresh the mutable identity fields (display name, picture)
    /// from a new login, returning the updated record.
    async fn update_user_identity(
        &self,
        user_id: Uuid,
        identity: &OAuthIdentity,
    ) -> Result<User, StorageError>;

    /// Admin looked up by (account email, admin username).
    async fn get_admin(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<AdminRecord>, StorageError>;

    /// Insert a new credential. Fails with
    /// [`StorageError::IdCollision`] when the generated id is taken.
    async fn insert_credential(&self, credential: &ApiCredential) -> Result<(), StorageError>;

    /// Live credential by (owner, id). Deleted credentials are
    /// excluded from this and every other read.
    async fn get_credential(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<ApiCredential>, StorageError>;

    /// All live credentials owned by `owner`.
    async fn list_credentials(&self, owner: Uuid) -> Result<Vec<ApiCredential>, StorageError>;

    /// Apply `mutation` to the (owner, id) credential if and only if
    /// it exists, is not deleted, and is not frozen — atomically with
    /// those checks — returning the post-update row.
    async fn conditional_update_credential(
        &self,
        owner: Uuid,
        id: Uuid,
        mutation: CredentialMutation,
    ) -> Result<CredentialUpdateOutcome, StorageError>;
}
