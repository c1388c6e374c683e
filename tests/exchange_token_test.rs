// ABOUTME: Integration tests for the admin step-up exchange flow
// ABOUTME: Uniform rejection on every failure path; exchange tokens cannot stand in for access tokens

mod common;

use std::sync::Arc;

use chrono::Utc;
use gatehouse::credentials::hash_secret;
use gatehouse::errors::AuthError;
use gatehouse::manager::AccountManager;
use gatehouse::models::{AdminRecord, Provider, User};
use gatehouse::oauth::ProviderRegistry;
use gatehouse::state::StateTokenStore;
use gatehouse::storage::memory::MemoryStorage;
use gatehouse::tokens::{TokenIssuer, TokenType};
use uuid::Uuid;

const ADMIN_PASSWORD: &str = "correct horse battery staple";

struct Setup {
    manager: AccountManager<MemoryStorage>,
    issuer: TokenIssuer,
    user: User,
    admin: AdminRecord,
}

async fn setup(keys: &common::TestKeys) -> Setup {
    let storage = Arc::new(MemoryStorage::new());

    let user = User {
        id: Uuid::new_v4(),
        email: "dev@example.com".into(),
        full_name: None,
        picture: None,
        provider: Provider::Google,
        provider_user_id: "sub-1".into(),
        scope: "gatehouse:user".into(),
        created_at: Utc::now(),
    };
    let admin = AdminRecord {
        admin_id: Uuid::new_v4(),
        email: user.email.clone(),
        username: "root".into(),
        password_hash: hash_secret(ADMIN_PASSWORD).unwrap(),
        scope: "gatehouse:admin".into(),
    };
    storage.add_user(user.clone()).await;
    storage.add_admin(admin.clone()).await;

    let manager = AccountManager::new(
        ProviderRegistry::new(),
        StateTokenStore::new(),
        common::issuer(keys),
        storage,
    );
    Setup {
        manager,
        issuer: common::issuer(keys),
        user,
        admin,
    }
}

#[tokio::test]
async fn valid_credentials_mint_an_admin_scoped_exchange_token() {
    let keys = common::generate_keys();
    let setup = setup(&keys).await;

    let bearer = setup
        .issuer
        .issue(&setup.user.id.to_string(), &setup.user.scope, TokenType::Access)
        .unwrap();

    let exchange = setup
        .manager
        .issue_exchange_token(&bearer.token, "root", ADMIN_PASSWORD)
        .await
        .unwrap();

    let claims = setup
        .issuer
        .validate_expected(&exchange.access_token, TokenType::Exchange)
        .unwrap();
    assert_eq!(claims.sub, setup.admin.admin_id.to_string());
    assert_eq!(claims.scope, "gatehouse:admin");
    assert_eq!(exchange.token_type, "Bearer");
}

#[tokio::test]
async fn wrong_password_is_a_uniform_rejection() {
    let keys = common::generate_keys();
    let setup = setup(&keys).await;

    let bearer = setup
        .issuer
        .issue(&setup.user.id.to_string(), &setup.user.scope, TokenType::Access)
        .unwrap();

    let err = setup
        .manager
        .issue_exchange_token(&bearer.token, "root", "wrong password")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated));
}

#[tokio::test]
async fn unknown_admin_username_is_a_uniform_rejection() {
    let keys = common::generate_keys();
    let setup = setup(&keys).await;

    let bearer = setup
        .issuer
        .issue(&setup.user.id.to_string(), &setup.user.scope, TokenType::Access)
        .unwrap();

    let err = setup
        .manager
        .issue_exchange_token(&bearer.token, "nobody", ADMIN_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated));
}

#[tokio::test]
async fn non_access_bearers_are_rejected() {
    let keys = common::generate_keys();
    let setup = setup(&keys).await;
    let subject = setup.user.id.to_string();

    // a refresh token is not an access token
    let refresh = setup
        .issuer
        .issue(&subject, &setup.user.scope, TokenType::Refresh)
        .unwrap();
    let err = setup
        .manager
        .issue_exchange_token(&refresh.token, "root", ADMIN_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated));

    // neither is an exchange token — no self-renewal
    let exchange = setup
        .issuer
        .issue(&subject, "gatehouse:admin", TokenType::Exchange)
        .unwrap();
    let err = setup
        .manager
        .issue_exchange_token(&exchange.token, "root", ADMIN_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated));
}

#[tokio::test]
async fn exchange_token_cannot_authorize_credential_operations() {
    let keys = common::generate_keys();
    let setup = setup(&keys).await;

    let exchange = setup
        .issuer
        .issue(
            &setup.admin.admin_id.to_string(),
            &setup.admin.scope,
            TokenType::Exchange,
        )
        .unwrap();

    let err = setup
        .manager
        .create_credential(&exchange.token, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated));
}

#[tokio::test]
async fn access_token_authorizes_credential_operations() {
    let keys = common::generate_keys();
    let setup = setup(&keys).await;

    let bearer = setup
        .issuer
        .issue(&setup.user.id.to_string(), &setup.user.scope, TokenType::Access)
        .unwrap();

    let (credential, plaintext) = setup
        .manager
        .create_credential(&bearer.token, Some("automation".into()))
        .await
        .unwrap();
    assert_eq!(credential.owner_user_id, setup.user.id);
    assert_eq!(plaintext.len(), 64);

    let listed = setup.manager.list_credentials(&bearer.token).await.unwrap();
    assert_eq!(listed.len(), 1);

    setup
        .manager
        .disable_credential(&bearer.token, credential.id)
        .await
        .unwrap();
    setup
        .manager
        .enable_credential(&bearer.token, credential.id)
        .await
        .unwrap();
    let rotated = setup
        .manager
        .rotate_credential(&bearer.token, credential.id)
        .await
        .unwrap();
    assert_ne!(rotated, plaintext);
    setup
        .manager
        .delete_credential(&bearer.token, credential.id)
        .await
        .unwrap();
    assert!(setup
        .manager
        .list_credentials(&bearer.token)
        .await
        .unwrap()
        .is_empty());
}
