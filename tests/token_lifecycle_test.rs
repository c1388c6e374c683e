// ABOUTME: Integration tests for service token minting and validation
// ABOUTME: Round trips, expiry, type confirmation, issuer matching, and tamper rejection

mod common;

use chrono::Utc;
use gatehouse::errors::TokenError;
use gatehouse::models::{AdminRecord, Provider, User};
use gatehouse::tokens::{TokenIssuer, TokenType};
use uuid::Uuid;

fn test_user() -> User {
    User {
        id: Uuid::new_v4(),
        email: "dev@example.com".into(),
        full_name: Some("Test User".into()),
        picture: None,
        provider: Provider::Github,
        provider_user_id: "12345".into(),
        scope: "gatehouse:user".into(),
        created_at: Utc::now(),
    }
}

#[test]
fn validate_returns_the_minted_claims() {
    let keys = common::generate_keys();
    let issuer = common::issuer(&keys);

    let subject = Uuid::new_v4().to_string();
    let signed = issuer
        .issue(&subject, "gatehouse:user extra:scope", TokenType::Access)
        .unwrap();

    let claims = issuer.validate(&signed.token).unwrap();
    assert_eq!(claims, signed.claims);
    assert_eq!(claims.sub, subject);
    assert_eq!(claims.scope, "gatehouse:user extra:scope");
    assert_eq!(claims.ttype, TokenType::Access);
    assert!(claims.exp > Utc::now().timestamp());

    // 60 minute TTL minus the 10 second client margin
    assert_eq!(signed.expires_in, Some(60 * 60 - 10));
}

#[test]
fn each_token_gets_a_unique_jti() {
    let keys = common::generate_keys();
    let issuer = common::issuer(&keys);

    let first = issuer.issue("sub", "", TokenType::Access).unwrap();
    let second = issuer.issue("sub", "", TokenType::Access).unwrap();
    assert_ne!(first.claims.jti, second.claims.jti);
}

#[test]
fn expired_token_is_rejected() {
    let keys = common::generate_keys();
    let mut config = common::jwt_config(&keys);
    // an access TTL in the past mints already-expired tokens while
    // still satisfying TTL(access) < TTL(refresh)
    config.access_ttl_minutes = -5;
    let issuer = TokenIssuer::new(&config).unwrap();

    let signed = issuer.issue("sub", "", TokenType::Access).unwrap();
    let err = issuer.validate(&signed.token).unwrap_err();
    assert!(matches!(err, TokenError::Expired));
}

#[test]
fn access_ttl_must_stay_below_refresh_ttl() {
    let keys = common::generate_keys();
    let mut config = common::jwt_config(&keys);
    config.access_ttl_minutes = config.refresh_ttl_minutes;
    assert!(TokenIssuer::new(&config).is_err());
}

#[test]
fn wrong_token_type_is_rejected() {
    let keys = common::generate_keys();
    let issuer = common::issuer(&keys);

    let access = issuer.issue("sub", "", TokenType::Access).unwrap();
    let err = issuer
        .validate_expected(&access.token, TokenType::Exchange)
        .unwrap_err();
    match err {
        TokenError::WrongType { expected, actual } => {
            assert_eq!(expected, TokenType::Exchange);
            assert_eq!(actual, TokenType::Access);
        }
        other => panic!("expected WrongType, got {other:?}"),
    }

    // the same token passes when the expected type matches
    assert!(issuer
        .validate_expected(&access.token, TokenType::Access)
        .is_ok());
}

#[test]
fn foreign_issuer_is_rejected() {
    let keys = common::generate_keys();
    let issuer = common::issuer(&keys);

    let mut foreign_config = common::jwt_config(&keys);
    foreign_config.issuer = "https://other.example".into();
    let foreign = TokenIssuer::new(&foreign_config).unwrap();

    let signed = foreign.issue("sub", "", TokenType::Access).unwrap();
    let err = issuer.validate(&signed.token).unwrap_err();
    assert!(matches!(err, TokenError::Invalid { .. }));
}

#[test]
fn tampered_token_is_rejected() {
    let keys = common::generate_keys();
    let issuer = common::issuer(&keys);

    let signed = issuer.issue("sub", "scope", TokenType::Access).unwrap();
    // flip a character in the payload segment
    let mut parts: Vec<String> = signed.token.split('.').map(str::to_owned).collect();
    let mut payload: Vec<u8> = parts[1].clone().into_bytes();
    payload[0] = if payload[0] == b'A' { b'B' } else { b'A' };
    parts[1] = String::from_utf8(payload).unwrap();
    let tampered = parts.join(".");

    assert!(issuer.validate(&tampered).is_err());
}

#[test]
fn session_envelope_carries_both_halves() {
    let keys = common::generate_keys();
    let issuer = common::issuer(&keys);
    let user = test_user();

    let session = issuer
        .mint_session(&user, Some("/settings".into()))
        .unwrap();
    assert_eq!(session.token_type, "Bearer");
    assert_eq!(session.userid, user.id.to_string());
    assert_eq!(session.ustate.as_deref(), Some("/settings"));
    assert_eq!(session.full_name.as_deref(), Some("Test User"));

    let access_claims = issuer
        .validate_expected(&session.access_token, TokenType::Access)
        .unwrap();
    let refresh_claims = issuer
        .validate_expected(session.refresh_token.as_deref().unwrap(), TokenType::Refresh)
        .unwrap();

    assert_eq!(access_claims.sub, refresh_claims.sub);
    // the paired refresh token always outlives the access token
    assert!(access_claims.exp < refresh_claims.exp);
}

#[test]
fn exchange_envelope_uses_the_admin_subject() {
    let keys = common::generate_keys();
    let issuer = common::issuer(&keys);
    let admin = AdminRecord {
        admin_id: Uuid::new_v4(),
        email: "dev@example.com".into(),
        username: "root".into(),
        password_hash: "unused".into(),
        scope: "gatehouse:admin".into(),
    };

    let exchange = issuer.mint_exchange(&admin).unwrap();
    let claims = issuer
        .validate_expected(&exchange.access_token, TokenType::Exchange)
        .unwrap();
    assert_eq!(claims.sub, admin.admin_id.to_string());
    assert_eq!(claims.scope, "gatehouse:admin");
}
