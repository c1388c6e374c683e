// ABOUTME: In-memory Storage implementation for tests and examples
// ABOUTME: A single mutex stands in for the backend's transaction isolation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Project

//! # In-Memory Storage
//!
//! Backs the integration tests and doc examples. Each record family
//! sits behind one mutex, which makes every trait method — including
//! the conditional credential update — a single atomic critical
//! section, the same guarantee a relational backend provides with a
//! transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CredentialMutation, CredentialUpdateOutcome, Storage, StorageError};
use crate::models::{AdminRecord, ApiCredential, OAuthIdentity, User};

/// In-memory [`Storage`] backend.
#[derive(Default)]
pub struct MemoryStorage {
    users: Mutex<HashMap<Uuid, User>>,
    admins: Mutex<Vec<AdminRecord>>,
    credentials: Mutex<HashMap<(Uuid, Uuid), ApiCredential>>,
}

impl MemoryStorage {
    /// Empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an admin record (the admin provisioning surface lives
    /// outside this crate).
    pub async fn add_admin(&self, admin: AdminRecord) {
        self.admins.lock().await.push(admin);
    }

    /// Seed a user record directly.
    pub async fn add_user(&self, user: User) {
        self.users.lock().await.insert(user.id, user);
    }

    /// Admin-side freeze, not reachable through the owner-facing
    /// trait. Returns whether a live credential was frozen.
    pub async fn freeze_credential(&self, owner: Uuid, id: Uuid) -> bool {
        let mut credentials = self.credentials.lock().await;
        match credentials.get_mut(&(owner, id)) {
            Some(credential) if !credential.deleted => {
                credential.frozen = true;
                credential.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StorageError> {
        Ok(self.users.lock().await.get(&user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn create_user(
        &self,
        identity: &OAuthIdentity,
        scope: &str,
    ) -> Result<User, StorageError> {
        let user = User {
            id: Uuid::new_v4(),
            email: identity.email.clone(),
            full_name: identity.full_name.clone(),
            picture: identity.picture.clone(),
            provider: identity.provider,
            provider_user_id: identity.provider_user_id.clone(),
            scope: scope.to_owned(),
            created_at: Utc::now(),
        };
        self.users.lock().await.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user_identity(
        &self,
        user_id: Uuid,
        identity: &OAuthIdentity,
    ) -> Result<User, StorageError> {
        let mut users = self.users.lock().await;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| StorageError::Backend(format!("no user {user_id}")))?;
        if identity.full_name.is_some() {
            user.full_name = identity.full_name.clone();
        }
        if identity.picture.is_some() {
            user.picture = identity.picture.clone();
        }
        Ok(user.clone())
    }

    async fn get_admin(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<AdminRecord>, StorageError> {
        Ok(self
            .admins
            .lock()
            .await
            .iter()
            .find(|admin| admin.email == email && admin.username == username)
            .cloned())
    }

    async fn insert_credential(&self, credential: &ApiCredential) -> Result<(), StorageError> {
        let mut credentials = self.credentials.lock().await;
        let key = (credential.owner_user_id, credential.id);
        if credentials.contains_key(&key) {
            return Err(StorageError::IdCollision);
        }
        credentials.insert(key, credential.clone());
        Ok(())
    }

    async fn get_credential(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<ApiCredential>, StorageError> {
        Ok(self
            .credentials
            .lock()
            .await
            .get(&(owner, id))
            .filter(|credential| !credential.deleted)
            .cloned())
    }

    async fn list_credentials(&self, owner: Uuid) -> Result<Vec<ApiCredential>, StorageError> {
        Ok(self
            .credentials
            .lock()
            .await
            .values()
            .filter(|credential| credential.owner_user_id == owner && !credential.deleted)
            .cloned()
            .collect())
    }

    async fn conditional_update_credential(
        &self,
        owner: Uuid,
        id: Uuid,
        mutation: CredentialMutation,
    ) -> Result<CredentialUpdateOutcome, StorageError> {
        let mut credentials = self.credentials.lock().await;
        let Some(credential) = credentials.get_mut(&(owner, id)) else {
            return Ok(CredentialUpdateOutcome::NotFound);
        };
        if credential.deleted {
            return Ok(CredentialUpdateOutcome::NotFound);
        }
        if credential.frozen {
            return Ok(CredentialUpdateOutcome::Frozen);
        }

        match mutation {
            CredentialMutation::SetDisabled(disabled) => credential.disabled = disabled,
            CredentialMutation::SetSecretHash(hash) => credential.secret_hash = hash,
            CredentialMutation::SetDeleted => credential.deleted = true,
        }
        credential.updated_at = Utc::now();

        Ok(CredentialUpdateOutcome::Updated(credential.clone()))
    }
}
