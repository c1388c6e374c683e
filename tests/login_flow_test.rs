// ABOUTME: End-to-end login flow tests: state consumption, replay rejection, session minting
// ABOUTME: Google OIDC id_token validation against a primed JWKS cache, offline

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use gatehouse::config::ProviderCredentials;
use gatehouse::constants::scopes;
use gatehouse::errors::{AuthError, AuthResult, TokenError};
use gatehouse::jwks::{JsonWebKey, JsonWebKeySet, JwksCache};
use gatehouse::manager::AccountManager;
use gatehouse::models::{OAuthIdentity, Provider, ProviderGrant};
use gatehouse::oauth::google::GoogleClient;
use gatehouse::oauth::{IdentityProviderClient, ProviderRegistry, TokenExchangeResponse};
use gatehouse::state::{StateToken, StateTokenStore};
use gatehouse::storage::memory::MemoryStorage;
use gatehouse::storage::Storage;
use gatehouse::tokens::TokenType;
use serde_json::json;

const GOOGLE_CLIENT_ID: &str = "cid.apps.googleusercontent.com";

/// Stand-in GitHub client: the wire protocol is exercised elsewhere;
/// here it feeds canned outcomes into the manager's login flow.
struct FakeGithub {
    fail_exchange: bool,
}

fn canned_identity() -> OAuthIdentity {
    OAuthIdentity {
        email: "dev@example.com".into(),
        full_name: Some("Dev Eloper".into()),
        picture: Some("https://avatars.example/dev".into()),
        provider: Provider::Github,
        provider_user_id: "12345".into(),
        provider_username: Some("dev".into()),
        credentials: ProviderGrant {
            access_token: "gho_token".into(),
            refresh_token: None,
            id_token: None,
            scope: "read:user,user:email".into(),
            expires_in: None,
        },
    }
}

#[async_trait]
impl IdentityProviderClient for FakeGithub {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    fn build_login_url(&self, token: &StateToken) -> String {
        format!("https://github.test/authorize?state={}", token.state)
    }

    fn validate_scope(&self, _granted_scope: &str) -> AuthResult<()> {
        Ok(())
    }

    async fn exchange_code(&self, _code: &str, _token: &StateToken) -> AuthResult<OAuthIdentity> {
        if self.fail_exchange {
            Err(AuthError::Provider("token endpoint returned 502".into()))
        } else {
            Ok(canned_identity())
        }
    }
}

fn manager_with(
    fail_exchange: bool,
    keys: &common::TestKeys,
) -> (AccountManager<MemoryStorage>, Arc<MemoryStorage>) {
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(FakeGithub { fail_exchange }));
    let storage = Arc::new(MemoryStorage::new());
    let manager = AccountManager::new(
        registry,
        StateTokenStore::new(),
        common::issuer(keys),
        Arc::clone(&storage),
    );
    (manager, storage)
}

#[tokio::test]
async fn login_round_trip_creates_a_user_and_mints_a_session() {
    let keys = common::generate_keys();
    let (manager, storage) = manager_with(false, &keys);
    let validator = common::issuer(&keys);

    let redirect = manager
        .begin_login(Provider::Github, Some("/dashboard".into()))
        .await
        .unwrap();
    assert!(redirect
        .authorization_url
        .contains(&format!("state={}", redirect.state)));

    let session = manager.complete_login("code", &redirect.state).await.unwrap();
    assert_eq!(session.ustate.as_deref(), Some("/dashboard"));
    assert_eq!(session.full_name.as_deref(), Some("Dev Eloper"));

    let claims = validator
        .validate_expected(&session.access_token, TokenType::Access)
        .unwrap();
    let user = storage
        .get_user_by_email("dev@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claims.sub, user.id.to_string());
    assert_eq!(claims.scope, "gatehouse:user");

    // a second login finds the same account instead of creating one
    let redirect = manager.begin_login(Provider::Github, None).await.unwrap();
    let session = manager.complete_login("code", &redirect.state).await.unwrap();
    assert_eq!(session.userid, user.id.to_string());
}

#[tokio::test]
async fn unknown_state_is_a_csrf_rejection() {
    let keys = common::generate_keys();
    let (manager, _storage) = manager_with(false, &keys);

    let err = manager.complete_login("code", "never-issued").await.unwrap_err();
    assert!(matches!(err, AuthError::Csrf));
}

#[tokio::test]
async fn state_cannot_be_replayed_after_success() {
    let keys = common::generate_keys();
    let (manager, _storage) = manager_with(false, &keys);

    let redirect = manager.begin_login(Provider::Github, None).await.unwrap();
    manager.complete_login("code", &redirect.state).await.unwrap();

    let err = manager
        .complete_login("code", &redirect.state)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Csrf));
}

#[tokio::test]
async fn failed_exchange_still_consumes_the_state() {
    let keys = common::generate_keys();
    let (manager, _storage) = manager_with(true, &keys);

    let redirect = manager.begin_login(Provider::Github, None).await.unwrap();
    let err = manager
        .complete_login("code", &redirect.state)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Provider(_)));

    // the popped token was not refunded
    let err = manager
        .complete_login("code", &redirect.state)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Csrf));
}

#[tokio::test]
async fn unregistered_provider_is_rejected() {
    let keys = common::generate_keys();
    let (manager, _storage) = manager_with(false, &keys);

    let err = manager.begin_login(Provider::Google, None).await.unwrap_err();
    assert!(matches!(err, AuthError::UnsupportedProvider(_)));
}

#[tokio::test]
async fn refresh_token_renews_the_session_but_access_token_does_not() {
    let keys = common::generate_keys();
    let (manager, _storage) = manager_with(false, &keys);
    let validator = common::issuer(&keys);

    let redirect = manager.begin_login(Provider::Github, None).await.unwrap();
    let session = manager.complete_login("code", &redirect.state).await.unwrap();

    let renewed = manager
        .refresh_session(session.refresh_token.as_deref().unwrap())
        .await
        .unwrap();
    assert!(validator
        .validate_expected(&renewed.access_token, TokenType::Access)
        .is_ok());
    assert_eq!(renewed.userid, session.userid);

    let err = manager
        .refresh_session(&session.access_token)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::Token(TokenError::WrongType { .. })
    ));
}

// ================================
// Google OIDC id_token validation
// ================================

async fn primed_google_client(
    signing_public: &rsa::RsaPublicKey,
) -> GoogleClient {
    let config = ProviderCredentials {
        client_id: GOOGLE_CLIENT_ID.into(),
        client_secret: "google-client-secret-value".into(),
        redirect_uri: "http://localhost:8080/auth".into(),
        scope: scopes::GOOGLE_LOGIN.to_owned(),
        offline_access: false,
    };
    let jwks = Arc::new(JwksCache::new(reqwest::Client::new()));
    jwks.prime(
        Provider::Google,
        JsonWebKeySet {
            keys: vec![JsonWebKey::from_rsa_public("k1", signing_public)],
        },
    )
    .await;
    GoogleClient::new(&config, jwks, reqwest::Client::new())
}

fn sign_id_token(private_pem: &str, claims: &serde_json::Value) -> String {
    let key = jsonwebtoken::EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    header.kid = Some("k1".into());
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

fn google_token_response(id_token: String) -> TokenExchangeResponse {
    TokenExchangeResponse {
        access_token: Some("ya29.access".into()),
        token_type: Some("Bearer".into()),
        scope: Some("openid email profile".into()),
        expires_in: Some(3599),
        refresh_token: None,
        id_token: Some(id_token),
    }
}

fn id_claims(nonce: &str) -> serde_json::Value {
    json!({
        "iss": "https://accounts.google.com",
        "aud": GOOGLE_CLIENT_ID,
        "sub": "117179329109786909885",
        "email": "dev@example.com",
        "email_verified": true,
        "name": "Dev Eloper",
        "picture": "https://lh3.example/photo",
        "nonce": nonce,
        "iat": Utc::now().timestamp(),
        "exp": Utc::now().timestamp() + 3600,
    })
}

#[tokio::test]
async fn valid_id_token_normalizes_into_an_identity() {
    let keys = common::generate_keys();
    let client = primed_google_client(&keys.public_key).await;

    let state = StateToken::mint(Provider::Google, None, true);
    let nonce = state.nonce.clone().unwrap();
    let id_token = sign_id_token(&keys.private_pem, &id_claims(&nonce));

    let identity = client
        .process_token_response(google_token_response(id_token), &state)
        .await
        .unwrap();

    assert_eq!(identity.provider, Provider::Google);
    assert_eq!(identity.email, "dev@example.com");
    assert_eq!(identity.provider_user_id, "117179329109786909885");
    assert_eq!(identity.full_name.as_deref(), Some("Dev Eloper"));
    assert_eq!(identity.credentials.access_token, "ya29.access");
}

#[tokio::test]
async fn nonce_mismatch_is_a_csrf_rejection() {
    let keys = common::generate_keys();
    let client = primed_google_client(&keys.public_key).await;

    // state was minted with nonce N1; the id_token claims N2
    let state = StateToken::mint(Provider::Google, None, true);
    let id_token = sign_id_token(&keys.private_pem, &id_claims("a-different-nonce"));

    let err = client
        .process_token_response(google_token_response(id_token), &state)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Csrf));
}

#[tokio::test]
async fn id_token_signed_by_an_unknown_key_is_a_signature_error() {
    let cached = common::generate_keys();
    let rogue = common::generate_keys();
    // the cache holds `cached`; the token is signed with `rogue`
    let client = primed_google_client(&cached.public_key).await;

    let state = StateToken::mint(Provider::Google, None, true);
    let nonce = state.nonce.clone().unwrap();
    let id_token = sign_id_token(&rogue.private_pem, &id_claims(&nonce));

    let err = client
        .process_token_response(google_token_response(id_token), &state)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Signature(_)));
}

#[tokio::test]
async fn unverified_google_email_is_rejected() {
    let keys = common::generate_keys();
    let client = primed_google_client(&keys.public_key).await;

    let state = StateToken::mint(Provider::Google, None, true);
    let nonce = state.nonce.clone().unwrap();
    let mut claims = id_claims(&nonce);
    claims["email_verified"] = json!(false);
    let id_token = sign_id_token(&keys.private_pem, &claims);

    let err = client
        .process_token_response(google_token_response(id_token), &state)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::EmailNotVerified(Provider::Google)
    ));
}

#[tokio::test]
async fn missing_id_token_is_a_provider_error() {
    let keys = common::generate_keys();
    let client = primed_google_client(&keys.public_key).await;

    let state = StateToken::mint(Provider::Google, None, true);
    let mut response = google_token_response("unused".into());
    response.id_token = None;

    let err = client
        .process_token_response(response, &state)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Provider(_)));
}

#[tokio::test]
async fn insufficient_grant_names_the_missing_scopes() {
    let keys = common::generate_keys();
    let client = primed_google_client(&keys.public_key).await;

    let state = StateToken::mint(Provider::Google, None, true);
    let mut response = google_token_response("unused".into());
    response.scope = Some("openid email".into());

    let err = client
        .process_token_response(response, &state)
        .await
        .unwrap_err();
    match err {
        AuthError::Scope { missing } => {
            assert_eq!(missing, "https://www.googleapis.com/auth/userinfo.profile");
        }
        other => panic!("expected Scope error, got {other:?}"),
    }
}
